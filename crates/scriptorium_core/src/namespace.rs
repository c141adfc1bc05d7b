//! Namespace facade over the vault and pattern record sets.
//!
//! # Responsibility
//! - Wire store, backlink index and services for one namespace.
//! - Open both namespaces of a library from one `VaultConfig`.
//!
//! # Invariants
//! - The two namespaces share no records, no locks and no index.
//! - A namespace's backlink index is rebuilt from disk when it is opened.

use crate::config::{ConfigError, VaultConfig};
use crate::index::backlinks::BacklinkIndex;
use crate::index::link_extractor::WikiLinkExtractor;
use crate::repo::fs_store::{FsEntityStore, WriteDurability};
use crate::service::document_service::DocumentService;
use crate::service::error::VaultError;
use crate::service::integrity::IntegrityService;
use crate::service::tree_service::TreeService;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Record sets managed by a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// User documents and folders.
    Vault,
    /// Reusable pattern documents and pattern folders.
    Patterns,
}

impl NamespaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Patterns => "patterns",
        }
    }
}

impl Display for NamespaceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures while opening a library.
#[derive(Debug)]
pub enum LibraryError {
    Config(ConfigError),
    Vault(VaultError),
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Vault(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Vault(err) => Some(err),
        }
    }
}

impl From<ConfigError> for LibraryError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<VaultError> for LibraryError {
    fn from(value: VaultError) -> Self {
        Self::Vault(value)
    }
}

/// One namespace: documents, folders and their backlink index.
pub struct Namespace {
    kind: NamespaceKind,
    store: Arc<FsEntityStore>,
    documents: DocumentService<FsEntityStore>,
    tree: TreeService<FsEntityStore>,
    integrity: IntegrityService<FsEntityStore>,
}

impl Namespace {
    /// Opens (creating if needed) a namespace rooted at `root`.
    pub fn open(
        kind: NamespaceKind,
        root: impl Into<PathBuf>,
        durability: WriteDurability,
    ) -> Result<Self, VaultError> {
        let store = Arc::new(FsEntityStore::open(root, durability)?);
        let index = Arc::new(BacklinkIndex::new(Arc::new(WikiLinkExtractor)));
        let documents = DocumentService::new(Arc::clone(&store), index);
        documents.rebuild_backlinks()?;

        Ok(Self {
            kind,
            tree: TreeService::new(Arc::clone(&store), documents.clone()),
            integrity: IntegrityService::new(Arc::clone(&store), documents.clone()),
            documents,
            store,
        })
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    /// Directory holding this namespace's records.
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Document operations, including links and version history.
    pub fn documents(&self) -> &DocumentService<FsEntityStore> {
        &self.documents
    }

    /// Folder hierarchy operations.
    pub fn tree(&self) -> &TreeService<FsEntityStore> {
        &self.tree
    }

    /// Orphan, cycle and index drift checks.
    pub fn integrity(&self) -> &IntegrityService<FsEntityStore> {
        &self.integrity
    }
}

/// Vault and pattern namespaces opened from one configuration.
pub struct Library {
    config: VaultConfig,
    vault: Namespace,
    patterns: Namespace,
}

impl Library {
    /// Validates `config`, then opens both namespaces.
    pub fn open(config: VaultConfig) -> Result<Self, LibraryError> {
        let started_at = Instant::now();
        config.validate()?;

        let opened = Namespace::open(NamespaceKind::Vault, config.vault_path(), config.durability)
            .and_then(|vault| {
                Namespace::open(
                    NamespaceKind::Patterns,
                    config.patterns_path(),
                    config.durability,
                )
                .map(|patterns| (vault, patterns))
            });
        let (vault, patterns) = match opened {
            Ok(namespaces) => namespaces,
            Err(err) => {
                error!(
                    "event=library_open module=vault status=error root={} error={}",
                    config.root.display(),
                    err
                );
                return Err(err.into());
            }
        };

        info!(
            "event=library_open module=vault status=ok root={} vault_documents={} pattern_documents={} duration_ms={}",
            config.root.display(),
            vault.documents().index().len(),
            patterns.documents().index().len(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            config,
            vault,
            patterns,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn vault(&self) -> &Namespace {
        &self.vault
    }

    pub fn patterns(&self) -> &Namespace {
        &self.patterns
    }

    pub fn namespace(&self, kind: NamespaceKind) -> &Namespace {
        match kind {
            NamespaceKind::Vault => &self.vault,
            NamespaceKind::Patterns => &self.patterns,
        }
    }
}
