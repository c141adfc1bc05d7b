//! Service-level error type shared by document, tree and integrity services.
//!
//! # Responsibility
//! - Carry typed not-found, validation and invalid-operation results.
//! - Classify every failure into the kinds the request layer reports.
//!
//! # Invariants
//! - Store I/O failures pass through unchanged inside `Store`.
//! - Store validation failures surface as `Validation`, not `Store`.

use crate::model::record::{EntityId, RecordKind, ValidationError};
use crate::repo::entity_store::StoreError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type VaultResult<T> = Result<T, VaultError>;

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    InvalidOperation,
    /// Non-recursive delete of a non-empty folder; carries remediation data.
    Conflict,
    Io,
}

/// Errors from document, tree and integrity operations.
#[derive(Debug)]
pub enum VaultError {
    /// Referenced record does not exist.
    NotFound { kind: RecordKind, id: EntityId },
    /// Input rejected.
    Validation(ValidationError),
    /// Folder move would make a folder its own ancestor.
    CycleDetected {
        folder_id: EntityId,
        parent_id: EntityId,
    },
    /// Copy target lies inside the copied subtree.
    CopyIntoOwnSubtree {
        source_id: EntityId,
        target_id: EntityId,
    },
    /// Persistence failure.
    Store(StoreError),
}

impl VaultError {
    pub(crate) fn document_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: RecordKind::Document,
            id: id.to_string(),
        }
    }

    pub(crate) fn folder_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: RecordKind::Folder,
            id: id.to_string(),
        }
    }

    /// Reporting class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::CycleDetected { .. } | Self::CopyIntoOwnSubtree { .. } => {
                ErrorKind::InvalidOperation
            }
            Self::Store(StoreError::Validation(_)) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Io,
        }
    }
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::CycleDetected {
                folder_id,
                parent_id,
            } => write!(
                f,
                "move would create cycle: folder {folder_id} under parent {parent_id}"
            ),
            Self::CopyIntoOwnSubtree {
                source_id,
                target_id,
            } => write!(
                f,
                "cannot copy folder {source_id} into its own subtree at {target_id}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for VaultError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}
