//! Folder domain model.

use crate::model::record::{generate_id, EntityId, Record, RecordKind};
use crate::model::timestamp::{self, Timestamp};
use serde::{Deserialize, Serialize};

/// Folder record. `parent_id = None` means root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    #[serde(with = "timestamp::flexible", default = "timestamp::now")]
    pub created_at: Timestamp,
}

impl Folder {
    /// Creates a root-level folder with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(generate_id(), name)
    }

    /// Creates a root-level folder with a caller-provided id.
    pub fn with_id(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            created_at: timestamp::now(),
        }
    }

    /// Places this folder under `parent_id`.
    pub fn in_parent(mut self, parent_id: impl Into<EntityId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

impl Record for Folder {
    const KIND: RecordKind = RecordKind::Folder;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn merge_onto(mut self, existing: Option<&Self>, _saved_at: Timestamp) -> Self {
        if let Some(previous) = existing {
            self.created_at = previous.created_at;
        }
        self
    }
}
