//! Shared record identity and validation rules.
//!
//! # Responsibility
//! - Define the identifier type and the record kinds persisted by the store.
//! - Provide the validation applied before any record reaches disk.
//!
//! # Invariants
//! - Ids are non-empty and consist only of `[A-Za-z0-9_-]`, because they
//!   double as file stems.
//! - Names must not be blank.
//! - Document names never contain link syntax characters, so every
//!   document name can be written as a link target.

use crate::model::timestamp::Timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque record identifier, immutable after creation.
pub type EntityId = String;

const MAX_ID_LEN: usize = 128;

/// Characters a document name cannot carry: link delimiters, the anchor and
/// alias separators, inline code fences and line breaks.
pub const LINK_NAME_RESERVED: [char; 7] = ['[', ']', '|', '#', '`', '\n', '\r'];

/// Kinds of records persisted by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Document,
    Folder,
}

impl RecordKind {
    /// Stable lowercase label used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Folder => "folder",
        }
    }

    /// Directory holding this kind under a namespace root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Document => "documents",
            Self::Folder => "folders",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Record arrived without an id.
    MissingId { kind: RecordKind },
    /// Record arrived without a usable name.
    MissingName { kind: RecordKind, id: EntityId },
    /// Id cannot be used as a record key.
    InvalidId { kind: RecordKind, id: EntityId },
    /// Name contains a character reserved by the link syntax.
    ReservedNameChar {
        kind: RecordKind,
        name: String,
        ch: char,
    },
    /// Link rewrite target name is blank.
    BlankLinkTarget,
    /// Requested version snapshot does not exist.
    VersionOutOfRange {
        id: EntityId,
        index: usize,
        len: usize,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingId { kind } => write!(f, "{kind} is missing an id"),
            Self::MissingName { kind, id } => write!(f, "{kind} {id} is missing a name"),
            Self::InvalidId { kind, id } => write!(
                f,
                "{kind} id `{id}` is invalid; expected 1-{MAX_ID_LEN} chars of [A-Za-z0-9_-]"
            ),
            Self::ReservedNameChar { kind, name, ch } => write!(
                f,
                "{kind} name `{}` contains reserved link character {ch:?}",
                name.escape_debug()
            ),
            Self::BlankLinkTarget => write!(f, "link target name must not be blank"),
            Self::VersionOutOfRange { id, index, len } => write!(
                f,
                "document {id} has {len} version(s); index {index} is out of range"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Generates a fresh record id.
pub fn generate_id() -> EntityId {
    Uuid::new_v4().to_string()
}

/// Validates that `id` can key a record of `kind`.
pub fn validate_id(kind: RecordKind, id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::MissingId { kind });
    }
    let well_formed = id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !well_formed {
        return Err(ValidationError::InvalidId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Validates that `name` can appear as a link target.
pub fn validate_link_name(kind: RecordKind, name: &str) -> Result<(), ValidationError> {
    match name.chars().find(|ch| LINK_NAME_RESERVED.contains(ch)) {
        Some(ch) => Err(ValidationError::ReservedNameChar {
            kind,
            name: name.to_string(),
            ch,
        }),
        None => Ok(()),
    }
}

/// Persistable record contract shared by documents and folders.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Kind used to route the record to its directory.
    const KIND: RecordKind;

    /// Record id.
    fn id(&self) -> &str;

    /// Record display name.
    fn name(&self) -> &str;

    /// Checks required fields before persistence.
    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_required()
    }

    /// Id and name checks shared by every kind.
    fn validate_required(&self) -> Result<(), ValidationError> {
        validate_id(Self::KIND, self.id())?;
        if self.name().trim().is_empty() {
            return Err(ValidationError::MissingName {
                kind: Self::KIND,
                id: self.id().to_string(),
            });
        }
        Ok(())
    }

    /// Applies upsert semantics of `self` over the currently persisted state.
    ///
    /// `saved_at` is the commit time of this write.
    fn merge_onto(self, existing: Option<&Self>, saved_at: Timestamp) -> Self;
}
