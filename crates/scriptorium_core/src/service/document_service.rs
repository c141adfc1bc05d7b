//! Document use-case service.
//!
//! # Responsibility
//! - Provide document CRUD, move, rename and relink over the entity store.
//! - Keep the backlink index in step with every document mutation.
//!
//! # Invariants
//! - The index is updated inside the same call, under the record lock, so a
//!   caller always reads its own writes.
//! - `folder_id`, when set, references an existing folder at write time.
//! - Rename never cascades by itself; `update_links` (or
//!   `rename_and_relink`) rewrites references.
//! - Deletes are idempotent and leave references elsewhere dangling.

use crate::index::backlinks::{Backlink, BacklinkIndex};
use crate::model::document::{Document, DocumentVersion};
use crate::model::folder::Folder;
use crate::model::record::{validate_link_name, EntityId, RecordKind, ValidationError};
use crate::repo::entity_store::EntityStore;
use crate::service::error::{VaultError, VaultResult};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;

/// Result of a rename followed by relinking.
#[derive(Debug, Clone, PartialEq)]
pub struct RelinkOutcome {
    /// Renamed document as persisted.
    pub document: Document,
    /// Name before the rename.
    pub old_name: String,
    /// Number of documents whose content was rewritten.
    pub relinked: usize,
}

/// Document service facade over one namespace.
pub struct DocumentService<S: EntityStore> {
    store: Arc<S>,
    index: Arc<BacklinkIndex>,
}

impl<S: EntityStore> Clone for DocumentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            index: Arc::clone(&self.index),
        }
    }
}

impl<S: EntityStore> DocumentService<S> {
    /// Creates a service over `store`, maintaining `index`.
    pub fn new(store: Arc<S>, index: Arc<BacklinkIndex>) -> Self {
        Self { store, index }
    }

    /// Backlink index maintained by this service.
    pub fn index(&self) -> &BacklinkIndex {
        &self.index
    }

    /// Lists documents sorted by `updated_at DESC, id ASC`.
    pub fn list_documents(&self) -> VaultResult<Vec<Document>> {
        let mut documents = self.store.load::<Document>()?;
        documents.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }

    /// Gets one document, failing with `NotFound` when absent.
    pub fn get_document(&self, id: &str) -> VaultResult<Document> {
        self.find_document(id)?
            .ok_or_else(|| VaultError::document_not_found(id))
    }

    /// Gets one document if present.
    pub fn find_document(&self, id: &str) -> VaultResult<Option<Document>> {
        Ok(self.store.get::<Document>(id)?)
    }

    /// Upserts one document.
    ///
    /// Changed content appends the previous content to `versions`. An empty
    /// `folder_id` is treated as root.
    pub fn save_document(&self, document: Document) -> VaultResult<Document> {
        let mut document = document;
        document.name = document.name.trim().to_string();
        document.folder_id = document.folder_id.filter(|id| !id.is_empty());
        if let Some(folder_id) = document.folder_id.as_deref() {
            self.ensure_folder_exists(folder_id)?;
        }

        let saved = self
            .store
            .save_observed(document, |saved| self.index.upsert(saved))?;
        info!(
            "event=document_save module=documents status=ok id={} versions={}",
            saved.id,
            saved.versions.len()
        );
        Ok(saved)
    }

    /// Creates a document with a generated id.
    pub fn create_document(
        &self,
        name: impl Into<String>,
        content: impl Into<String>,
        folder_id: Option<&str>,
    ) -> VaultResult<Document> {
        let mut document = Document::new(name, content);
        document.folder_id = folder_id.map(str::to_string);
        self.save_document(document)
    }

    /// Deletes one document; returns whether it existed.
    ///
    /// Deleting a missing id is not an error.
    pub fn delete_document(&self, id: &str) -> VaultResult<bool> {
        let existed = self.store.delete_observed::<Document, _>(id, |_| {
            self.index.remove(id);
        })?;
        info!(
            "event=document_delete module=documents status=ok id={} existed={}",
            id, existed
        );
        Ok(existed)
    }

    /// Reparents one document; `None` moves it to root.
    pub fn move_document(&self, id: &str, folder_id: Option<&str>) -> VaultResult<Document> {
        let target = folder_id.filter(|value| !value.is_empty());
        if let Some(target) = target {
            self.ensure_folder_exists(target)?;
        }
        let moved = self
            .store
            .update_observed::<Document, _, _>(
                id,
                |document| document.folder_id = target.map(str::to_string),
                |saved| self.index.upsert(saved),
            )?
            .ok_or_else(|| VaultError::document_not_found(id))?;
        info!(
            "event=document_move module=documents status=ok id={} folder={}",
            id,
            target.unwrap_or("root")
        );
        Ok(moved)
    }

    /// Renames one document in place. References are not rewritten.
    pub fn rename_document(&self, id: &str, new_name: &str) -> VaultResult<Document> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName {
                kind: RecordKind::Document,
                id: id.to_string(),
            }
            .into());
        }
        validate_link_name(RecordKind::Document, name)?;
        let renamed = self
            .store
            .update_observed::<Document, _, _>(
                id,
                |document| document.name = name.to_string(),
                |saved| self.index.upsert(saved),
            )?
            .ok_or_else(|| VaultError::document_not_found(id))?;
        info!(
            "event=document_rename module=documents status=ok id={}",
            id
        );
        Ok(renamed)
    }

    /// Rewrites every reference to `old_name` into `new_name`.
    ///
    /// `new_name` must be a valid document name, so the rewritten links
    /// resolve. Scans all documents and returns the number rewritten. Each rewrite is
    /// an individual save; a failure stops the scan and already rewritten
    /// documents stay rewritten.
    pub fn update_links(&self, old_name: &str, new_name: &str) -> VaultResult<usize> {
        let old_name = old_name.trim();
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(ValidationError::BlankLinkTarget.into());
        }
        validate_link_name(RecordKind::Document, new_name)?;
        if old_name.is_empty() || old_name == new_name {
            return Ok(0);
        }

        let started_at = Instant::now();
        let extractor = self.index.extractor();
        let mut updated = 0;
        for document in self.store.load::<Document>()? {
            if !extractor.extract(&document.content).contains(old_name) {
                continue;
            }

            let mut changed = false;
            let result = self.store.update_observed::<Document, _, _>(
                &document.id,
                |current| {
                    if let Some(rewritten) = extractor.rewrite(&current.content, old_name, new_name)
                    {
                        current.content = rewritten;
                        changed = true;
                    }
                },
                |saved| self.index.upsert(saved),
            );
            if let Err(err) = result {
                error!(
                    "event=links_update module=documents status=error id={} updated={} error={}",
                    document.id, updated, err
                );
                return Err(err.into());
            }
            if changed {
                updated += 1;
            }
        }

        info!(
            "event=links_update module=documents status=ok updated={} duration_ms={}",
            updated,
            started_at.elapsed().as_millis()
        );
        Ok(updated)
    }

    /// Renames one document and rewrites references to its old name.
    ///
    /// The two steps are sequential writes, not one transaction; rerunning
    /// `update_links(old, new)` completes an interrupted relink.
    pub fn rename_and_relink(&self, id: &str, new_name: &str) -> VaultResult<RelinkOutcome> {
        let old_name = self.get_document(id)?.name;
        let document = self.rename_document(id, new_name)?;
        let relinked = if old_name == document.name {
            0
        } else {
            self.update_links(&old_name, &document.name)?
        };
        Ok(RelinkOutcome {
            document,
            old_name,
            relinked,
        })
    }

    /// Other documents whose content links to the current name of `id`.
    pub fn backlinks_of(&self, id: &str) -> VaultResult<Vec<Backlink>> {
        if let Some(backlinks) = self.index.backlinks_of(id) {
            return Ok(backlinks);
        }
        // Written by another process since the last rebuild.
        let document = self.get_document(id)?;
        self.index.upsert(&document);
        Ok(self.index.backlinks_of(id).unwrap_or_default())
    }

    /// Version history of one document, oldest first.
    pub fn document_versions(&self, id: &str) -> VaultResult<Vec<DocumentVersion>> {
        Ok(self.get_document(id)?.versions)
    }

    /// Makes snapshot `version_index` the current content.
    ///
    /// The replaced content is appended to history like any other edit.
    pub fn restore_version(&self, id: &str, version_index: usize) -> VaultResult<Document> {
        let document = self.get_document(id)?;
        let Some(version) = document.versions.get(version_index) else {
            return Err(ValidationError::VersionOutOfRange {
                id: id.to_string(),
                index: version_index,
                len: document.versions.len(),
            }
            .into());
        };
        let content = version.content.clone();
        let restored = self
            .store
            .update_observed::<Document, _, _>(
                id,
                |current| current.content = content,
                |saved| self.index.upsert(saved),
            )?
            .ok_or_else(|| VaultError::document_not_found(id))?;
        info!(
            "event=document_restore module=documents status=ok id={} version={}",
            id, version_index
        );
        Ok(restored)
    }

    /// Rebuilds the backlink index from a full scan; returns documents indexed.
    pub fn rebuild_backlinks(&self) -> VaultResult<usize> {
        let documents = self.store.load::<Document>()?;
        Ok(self.index.rebuild(&documents))
    }

    /// Ids of documents directly inside `folder_id` (`None` = root).
    pub fn document_ids_in(&self, folder_id: Option<&str>) -> VaultResult<Vec<EntityId>> {
        Ok(self
            .store
            .load::<Document>()?
            .into_iter()
            .filter(|document| document.folder_id.as_deref() == folder_id)
            .map(|document| document.id)
            .collect())
    }

    fn ensure_folder_exists(&self, folder_id: &str) -> VaultResult<()> {
        match self.store.get::<Folder>(folder_id)? {
            Some(_) => Ok(()),
            None => Err(VaultError::folder_not_found(folder_id)),
        }
    }
}
