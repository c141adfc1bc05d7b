//! Domain model for documents, folders and their shared record contract.
//!
//! # Responsibility
//! - Define the canonical records persisted by the entity store.
//! - Keep validation and upsert merge rules next to the data they govern.
//!
//! # Invariants
//! - Every record is identified by a stable, file-safe `EntityId`.
//! - Patterns reuse the document/folder shapes under a separate namespace.

pub mod document;
pub mod folder;
pub mod record;
pub mod timestamp;

use self::document::Document;
use self::folder::Folder;

/// Reusable template document; same shape as [`Document`].
pub type Pattern = Document;

/// Folder in the pattern namespace; same shape as [`Folder`].
pub type PatternFolder = Folder;
