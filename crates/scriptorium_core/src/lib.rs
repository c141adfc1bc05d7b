//! Persistence and link-consistency engine for a markdown document vault.
//! This crate is the single source of truth for record and hierarchy invariants.

pub mod api;
pub mod config;
pub mod index;
pub mod logging;
pub mod model;
pub mod namespace;
pub mod repo;
pub mod service;

pub use config::{ConfigError, VaultConfig};
pub use index::backlinks::{Backlink, BacklinkIndex};
pub use index::link_extractor::{LinkExtractor, WikiLinkExtractor};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{Document, DocumentVersion};
pub use model::folder::Folder;
pub use model::record::{EntityId, RecordKind, ValidationError};
pub use model::{Pattern, PatternFolder};
pub use namespace::{Library, LibraryError, Namespace, NamespaceKind};
pub use repo::entity_store::{EntityStore, StoreError, StoreResult};
pub use repo::fs_store::{FsEntityStore, WriteDurability};
pub use service::document_service::{DocumentService, RelinkOutcome};
pub use service::error::{ErrorKind, VaultError, VaultResult};
pub use service::integrity::{IntegrityReport, IntegrityService, RepairSummary};
pub use service::tree_service::{DeleteFolderOutcome, FolderChildren, TreeService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
