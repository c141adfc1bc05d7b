//! Recovery path for interrupted multi-record operations.
//!
//! # Responsibility
//! - Report orphaned records, parent cycles and backlink index drift.
//! - Repair orphans by reparenting them to root.
//!
//! # Invariants
//! - Repair never deletes records.
//! - Reports are computed from one full scan of the namespace.

use crate::model::document::Document;
use crate::model::folder::Folder;
use crate::model::record::EntityId;
use crate::repo::entity_store::EntityStore;
use crate::service::document_service::DocumentService;
use crate::service::error::VaultResult;
use crate::service::tree_service::FolderArena;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Integrity scan result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Documents whose `folder_id` references a missing folder.
    pub orphan_documents: Vec<EntityId>,
    /// Folders whose `parent_id` references a missing folder.
    pub orphan_folders: Vec<EntityId>,
    /// Folders lying on a parent cycle.
    pub cycles: Vec<EntityId>,
    /// Whether the maintained backlink index equals a fresh rescan.
    pub index_consistent: bool,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_documents.is_empty()
            && self.orphan_folders.is_empty()
            && self.cycles.is_empty()
            && self.index_consistent
    }
}

/// Counts of records touched by `repair_orphans`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub documents_reparented: usize,
    pub folders_reparented: usize,
}

/// Integrity checks over one namespace.
pub struct IntegrityService<S: EntityStore> {
    store: Arc<S>,
    documents: DocumentService<S>,
}

impl<S: EntityStore> IntegrityService<S> {
    pub fn new(store: Arc<S>, documents: DocumentService<S>) -> Self {
        Self { store, documents }
    }

    /// Scans folders, documents and the backlink index.
    pub fn check_integrity(&self) -> VaultResult<IntegrityReport> {
        let folders = self.store.load::<Folder>()?;
        let documents = self.store.load::<Document>()?;
        let arena = FolderArena::from_folders(&folders);

        let orphan_documents: Vec<EntityId> = documents
            .iter()
            .filter(|document| {
                document
                    .folder_id
                    .as_deref()
                    .is_some_and(|folder_id| !arena.contains(folder_id))
            })
            .map(|document| document.id.clone())
            .collect();
        let orphan_folders: Vec<EntityId> = folders
            .iter()
            .filter(|folder| {
                folder
                    .parent_id
                    .as_deref()
                    .is_some_and(|parent_id| !arena.contains(parent_id))
            })
            .map(|folder| folder.id.clone())
            .collect();
        let mut cycles: Vec<EntityId> = arena.cycle_members().into_iter().collect();
        cycles.sort();

        let report = IntegrityReport {
            orphan_documents,
            orphan_folders,
            cycles,
            index_consistent: self.documents.index().is_consistent_with(&documents),
        };
        if report.is_clean() {
            info!("event=integrity_check module=vault status=ok");
        } else {
            warn!(
                "event=integrity_check module=vault status=issues orphan_documents={} orphan_folders={} cycles={} index_consistent={}",
                report.orphan_documents.len(),
                report.orphan_folders.len(),
                report.cycles.len(),
                report.index_consistent
            );
        }
        Ok(report)
    }

    /// Moves orphaned documents and folders to root and breaks parent cycles.
    ///
    /// For each cycle, the member with the smallest id is moved to root.
    pub fn repair_orphans(&self) -> VaultResult<RepairSummary> {
        let report = self.check_integrity()?;
        let mut summary = RepairSummary::default();

        for id in &report.orphan_documents {
            self.documents.move_document(id, None)?;
            summary.documents_reparented += 1;
        }

        let mut to_root: Vec<EntityId> = report.orphan_folders.clone();
        to_root.extend(self.cycle_breakers(&report.cycles)?);
        for id in &to_root {
            let moved = self
                .store
                .update::<Folder, _>(id, |folder| folder.parent_id = None)?;
            if moved.is_some() {
                summary.folders_reparented += 1;
            }
        }

        info!(
            "event=orphan_repair module=vault status=ok documents={} folders={}",
            summary.documents_reparented, summary.folders_reparented
        );
        Ok(summary)
    }

    /// One member per distinct cycle, so each cycle is opened exactly once.
    fn cycle_breakers(&self, cycles: &[EntityId]) -> VaultResult<Vec<EntityId>> {
        if cycles.is_empty() {
            return Ok(Vec::new());
        }
        let folders = self.store.load::<Folder>()?;
        let arena = FolderArena::from_folders(&folders);
        let mut covered: HashSet<&str> = HashSet::new();
        let mut breakers = Vec::new();
        // `cycles` is sorted, so the first unseen member of a ring is its smallest id.
        for id in cycles {
            if covered.contains(id.as_str()) {
                continue;
            }
            breakers.push(id.clone());
            let mut cursor = Some(id.as_str());
            while let Some(current) = cursor {
                if !covered.insert(current) {
                    break;
                }
                cursor = arena.parent_of(current);
            }
        }
        Ok(breakers)
    }
}
