//! Document domain model.
//!
//! # Responsibility
//! - Define the persisted document record and its version snapshots.
//! - Own upsert merge rules (version append, timestamp refresh).
//!
//! # Invariants
//! - `versions` is append-only and ordered oldest to newest.
//! - A save whose content equals the persisted content appends nothing.
//! - `created_at` of an existing document never changes on save.

use crate::model::record::{
    generate_id, validate_link_name, EntityId, Record, RecordKind, ValidationError,
};
use crate::model::timestamp::{self, Timestamp};
use serde::{Deserialize, Serialize};

/// One historical content snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    /// Content as it was before being replaced.
    pub content: String,
    /// When that content was last written.
    #[serde(with = "timestamp::flexible", default = "timestamp::now")]
    pub created_at: Timestamp,
}

/// Markdown document record.
///
/// Serialized with camelCase keys to match the request layer's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable id; also the record file stem.
    #[serde(default)]
    pub id: EntityId,
    /// Display name and link target token.
    #[serde(default)]
    pub name: String,
    /// Markdown body.
    #[serde(default)]
    pub content: String,
    /// Containing folder. `None` means root.
    #[serde(default)]
    pub folder_id: Option<EntityId>,
    #[serde(with = "timestamp::flexible", default = "timestamp::now")]
    pub created_at: Timestamp,
    /// Refreshed on every save.
    #[serde(with = "timestamp::flexible", default = "timestamp::now")]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub versions: Vec<DocumentVersion>,
    /// User notes attached to the document; never interpreted by core.
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

impl Document {
    /// Creates a root-level document with a generated id.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_id(generate_id(), name, content)
    }

    /// Creates a root-level document with a caller-provided id.
    pub fn with_id(
        id: impl Into<EntityId>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let created_at = timestamp::now();
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            folder_id: None,
            created_at,
            updated_at: created_at,
            versions: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Places this document in `folder_id`.
    pub fn in_folder(mut self, folder_id: impl Into<EntityId>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }
}

impl Record for Document {
    const KIND: RecordKind = RecordKind::Document;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_required()?;
        validate_link_name(Self::KIND, self.name.trim())
    }

    fn merge_onto(mut self, existing: Option<&Self>, saved_at: Timestamp) -> Self {
        if let Some(previous) = existing {
            self.created_at = previous.created_at;
            self.versions = previous.versions.clone();
            if previous.content != self.content {
                self.versions.push(DocumentVersion {
                    content: previous.content.clone(),
                    created_at: previous.updated_at,
                });
            }
        }
        self.updated_at = saved_at;
        self
    }
}
