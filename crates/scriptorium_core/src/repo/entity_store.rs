//! Entity store contract.
//!
//! # Responsibility
//! - Define record-level load/get/save/update/delete used by all services.
//! - Expose commit observers so derived state (the backlink index) can be
//!   updated while the record is still locked.
//!
//! # Invariants
//! - `save` is an upsert keyed by id and applies `Record::merge_onto`.
//! - `delete` is idempotent; a missing id is not an error.
//! - Operations on one record are serialized; readers never observe a torn
//!   record.

use crate::model::record::{Record, RecordKind, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity store failures.
#[derive(Debug)]
pub enum StoreError {
    /// Record rejected before persistence.
    Validation(ValidationError),
    /// Underlying filesystem operation failed.
    Io { path: PathBuf, source: io::Error },
    /// Persisted record cannot be decoded or does not match its key.
    Corrupt { path: PathBuf, detail: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "i/o failure at `{}`: {source}", path.display()),
            Self::Corrupt { path, detail } => {
                write!(f, "corrupt record at `{}`: {detail}", path.display())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Corrupt { .. } => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Record persistence contract.
///
/// `*_observed` variants run `observe` after the write is durable and before
/// the per-record lock is released.
pub trait EntityStore: Send + Sync {
    /// Loads every record of kind `R`, ordered by id.
    fn load<R: Record>(&self) -> StoreResult<Vec<R>>;

    /// Loads one record; `None` when absent.
    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>>;

    /// Upserts one record and returns the persisted form.
    fn save_observed<R, F>(&self, record: R, observe: F) -> StoreResult<R>
    where
        R: Record,
        F: FnOnce(&R);

    /// Read-modify-write of one existing record.
    ///
    /// Returns `None` without writing when the record does not exist.
    fn update_observed<R, M, F>(&self, id: &str, mutate: M, observe: F) -> StoreResult<Option<R>>
    where
        R: Record,
        M: FnOnce(&mut R),
        F: FnOnce(&R);

    /// Deletes one record; returns whether it existed.
    fn delete_observed<R, F>(&self, id: &str, observe: F) -> StoreResult<bool>
    where
        R: Record,
        F: FnOnce(bool);

    fn save<R: Record>(&self, record: R) -> StoreResult<R> {
        self.save_observed(record, |_| {})
    }

    fn update<R, M>(&self, id: &str, mutate: M) -> StoreResult<Option<R>>
    where
        R: Record,
        M: FnOnce(&mut R),
    {
        self.update_observed(id, mutate, |_| {})
    }

    fn delete<R: Record>(&self, id: &str) -> StoreResult<bool> {
        self.delete_observed::<R, _>(id, |_| {})
    }

    /// Directory or location label for diagnostics.
    fn location(&self, kind: RecordKind) -> PathBuf;
}
