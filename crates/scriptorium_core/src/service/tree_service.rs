//! Folder hierarchy use-case service.
//!
//! # Responsibility
//! - Validate folder hierarchy invariants above the entity store.
//! - Provide folder create, rename, move, copy, delete and tree queries.
//!
//! # Invariants
//! - Parent folder must exist when provided.
//! - Move and copy must not place a folder inside its own subtree.
//! - Parent-changing writes hold the hierarchy lock from the ancestor check
//!   through the write, so concurrent moves cannot combine into a cycle.
//! - Recursive delete removes documents first, then subfolders deepest
//!   first, then the folder itself.
//! - Multi-record operations are sequential single-record writes; a crash
//!   can leave a partial result that `IntegrityService` reports.

use crate::model::document::Document;
use crate::model::folder::Folder;
use crate::model::record::{generate_id, EntityId, RecordKind, ValidationError};
use crate::repo::entity_store::EntityStore;
use crate::service::document_service::DocumentService;
use crate::service::error::{VaultError, VaultResult};
use log::{error, info};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Result of a folder delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFolderOutcome {
    /// Folder (and, for recursive deletes, its subtree) was removed.
    Deleted {
        folders_removed: usize,
        documents_removed: usize,
    },
    /// Folder has children and the request was not recursive.
    ///
    /// `document_count` covers the whole subtree.
    NeedsConfirmation { document_count: usize },
}

/// Direct contents of one folder (or root).
#[derive(Debug, Clone, PartialEq)]
pub struct FolderChildren {
    pub folders: Vec<Folder>,
    pub documents: Vec<Document>,
}

/// Parent-pointer snapshot of all folders keyed by id.
///
/// Walks are bounded by the node count, so pre-existing cycles on disk
/// terminate instead of looping.
#[derive(Debug, Clone, Default)]
pub(crate) struct FolderArena {
    parents: HashMap<EntityId, Option<EntityId>>,
}

impl FolderArena {
    pub(crate) fn from_folders(folders: &[Folder]) -> Self {
        Self {
            parents: folders
                .iter()
                .map(|folder| (folder.id.clone(), folder.parent_id.clone()))
                .collect(),
        }
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.parents.contains_key(id)
    }

    pub(crate) fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).and_then(|parent| parent.as_deref())
    }

    /// Whether `candidate` is `ancestor` or lies below it.
    ///
    /// A cycle reached on the way up counts as containment.
    pub(crate) fn is_within(&self, candidate: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) || visited.len() > self.parents.len() + 1 {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    /// Ids on a parent cycle.
    pub(crate) fn cycle_members(&self) -> HashSet<EntityId> {
        let mut members = HashSet::new();
        for start in self.parents.keys() {
            let mut seen = HashSet::new();
            let mut cursor = Some(start.as_str());
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    if current == start {
                        members.insert(start.clone());
                    }
                    break;
                }
                cursor = self.parent_of(current);
            }
        }
        members
    }

    /// Folder ids of the subtree rooted at `root`, parents before children.
    pub(crate) fn subtree(&self, root: &str) -> Vec<EntityId> {
        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, parent) in &self.parents {
            if let Some(parent) = parent.as_deref() {
                children.entry(parent).or_default().push(id.as_str());
            }
        }
        for list in children.values_mut() {
            list.sort_unstable();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current.to_string());
            if let Some(next) = children.get(current) {
                queue.extend(next.iter().copied());
            }
        }
        order
    }
}

/// Folder hierarchy service facade over one namespace.
pub struct TreeService<S: EntityStore> {
    store: Arc<S>,
    documents: DocumentService<S>,
    /// Serializes check-then-write on parent pointers across the namespace.
    hierarchy: Arc<Mutex<()>>,
}

impl<S: EntityStore> Clone for TreeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            documents: self.documents.clone(),
            hierarchy: Arc::clone(&self.hierarchy),
        }
    }
}

impl<S: EntityStore> TreeService<S> {
    /// Creates a service sharing `documents`' store and index.
    pub fn new(store: Arc<S>, documents: DocumentService<S>) -> Self {
        Self {
            store,
            documents,
            hierarchy: Arc::new(Mutex::new(())),
        }
    }

    /// Lists folders sorted by name, then id.
    pub fn list_folders(&self) -> VaultResult<Vec<Folder>> {
        let mut folders = self.store.load::<Folder>()?;
        sort_folders(&mut folders);
        Ok(folders)
    }

    /// Gets one folder, failing with `NotFound` when absent.
    pub fn get_folder(&self, id: &str) -> VaultResult<Folder> {
        self.store
            .get::<Folder>(id)?
            .ok_or_else(|| VaultError::folder_not_found(id))
    }

    /// Upserts one folder.
    ///
    /// An empty `parent_id` is treated as root. Re-saving an existing folder
    /// under a new parent is subject to the same cycle check as a move.
    pub fn save_folder(&self, folder: Folder) -> VaultResult<Folder> {
        let mut folder = folder;
        folder.name = folder.name.trim().to_string();
        folder.parent_id = folder.parent_id.filter(|id| !id.is_empty());
        let _hierarchy = self.lock_hierarchy();
        if let Some(parent_id) = folder.parent_id.as_deref() {
            let arena = self.arena()?;
            if !arena.contains(parent_id) {
                return Err(VaultError::folder_not_found(parent_id));
            }
            if arena.is_within(parent_id, &folder.id) {
                return Err(VaultError::CycleDetected {
                    folder_id: folder.id.clone(),
                    parent_id: parent_id.to_string(),
                });
            }
        }

        let saved = self.store.save(folder)?;
        info!(
            "event=folder_save module=tree status=ok id={} parent={}",
            saved.id,
            saved.parent_id.as_deref().unwrap_or("root")
        );
        Ok(saved)
    }

    /// Creates a folder with a generated id under optional parent.
    pub fn create_folder(
        &self,
        name: impl Into<String>,
        parent_id: Option<&str>,
    ) -> VaultResult<Folder> {
        let mut folder = Folder::new(name);
        folder.parent_id = parent_id.map(str::to_string);
        self.save_folder(folder)
    }

    /// Reparents one folder; `None` moves it to root.
    pub fn move_folder(&self, id: &str, parent_id: Option<&str>) -> VaultResult<Folder> {
        let target = parent_id.filter(|value| !value.is_empty());
        let _hierarchy = self.lock_hierarchy();
        let arena = self.arena()?;
        if !arena.contains(id) {
            return Err(VaultError::folder_not_found(id));
        }
        if let Some(target) = target {
            if !arena.contains(target) {
                return Err(VaultError::folder_not_found(target));
            }
            if arena.is_within(target, id) {
                info!(
                    "event=folder_move module=tree status=rejected id={} parent={} reason=cycle",
                    id, target
                );
                return Err(VaultError::CycleDetected {
                    folder_id: id.to_string(),
                    parent_id: target.to_string(),
                });
            }
        }

        let moved = self
            .store
            .update::<Folder, _>(id, |folder| folder.parent_id = target.map(str::to_string))?
            .ok_or_else(|| VaultError::folder_not_found(id))?;
        info!(
            "event=folder_move module=tree status=ok id={} parent={}",
            id,
            target.unwrap_or("root")
        );
        Ok(moved)
    }

    /// Renames one folder. Contained records are untouched.
    pub fn rename_folder(&self, id: &str, new_name: &str) -> VaultResult<Folder> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName {
                kind: RecordKind::Folder,
                id: id.to_string(),
            }
            .into());
        }
        let renamed = self
            .store
            .update::<Folder, _>(id, |folder| folder.name = name.to_string())?
            .ok_or_else(|| VaultError::folder_not_found(id))?;
        info!("event=folder_rename module=tree status=ok id={}", id);
        Ok(renamed)
    }

    /// Deep-copies the subtree at `source_id` under `target_parent_id`.
    ///
    /// Every copied record gets a new id; internal parent/folder references
    /// are remapped. Document content is copied verbatim, links included.
    /// Copied documents start with an empty version history. Returns the id
    /// of the new root folder.
    pub fn copy_folder(
        &self,
        source_id: &str,
        target_parent_id: Option<&str>,
        new_name: Option<&str>,
    ) -> VaultResult<EntityId> {
        let started_at = Instant::now();
        let target = target_parent_id.filter(|value| !value.is_empty());
        let _hierarchy = self.lock_hierarchy();
        let folders = self.store.load::<Folder>()?;
        let arena = FolderArena::from_folders(&folders);
        let source = folders
            .iter()
            .find(|folder| folder.id == source_id)
            .ok_or_else(|| VaultError::folder_not_found(source_id))?;
        if let Some(target) = target {
            if !arena.contains(target) {
                return Err(VaultError::folder_not_found(target));
            }
            if arena.is_within(target, source_id) {
                return Err(VaultError::CopyIntoOwnSubtree {
                    source_id: source_id.to_string(),
                    target_id: target.to_string(),
                });
            }
        }

        let root_name = new_name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (copy)", source.name));

        let subtree = arena.subtree(source_id);
        let id_map: HashMap<&str, EntityId> = subtree
            .iter()
            .map(|id| (id.as_str(), generate_id()))
            .collect();
        let by_id: HashMap<&str, &Folder> = folders
            .iter()
            .map(|folder| (folder.id.as_str(), folder))
            .collect();

        let result = self.write_copies(&subtree, &id_map, &by_id, target, root_name);
        if let Err(err) = &result {
            error!(
                "event=folder_copy module=tree status=error source={} error={}",
                source_id, err
            );
        }
        let copied_documents = result?;

        let new_root = id_map
            .get(source_id)
            .cloned()
            .ok_or_else(|| VaultError::folder_not_found(source_id))?;
        info!(
            "event=folder_copy module=tree status=ok source={} new_id={} folders={} documents={} duration_ms={}",
            source_id,
            new_root,
            subtree.len(),
            copied_documents,
            started_at.elapsed().as_millis()
        );
        Ok(new_root)
    }

    /// Deletes one folder behind a confirmation gate.
    ///
    /// An empty folder is always deleted. A non-empty folder is deleted only
    /// when `recursive`; otherwise the subtree document count is returned.
    /// Deleting a missing folder removes nothing. Links elsewhere that point
    /// at deleted documents are left dangling.
    pub fn delete_folder(&self, id: &str, recursive: bool) -> VaultResult<DeleteFolderOutcome> {
        let folders = self.store.load::<Folder>()?;
        let arena = FolderArena::from_folders(&folders);
        if !arena.contains(id) {
            return Ok(DeleteFolderOutcome::Deleted {
                folders_removed: 0,
                documents_removed: 0,
            });
        }

        let documents = self.store.load::<Document>()?;
        let subtree = arena.subtree(id);
        let members: HashSet<&str> = subtree.iter().map(String::as_str).collect();
        let contained: Vec<&Document> = documents
            .iter()
            .filter(|document| {
                document
                    .folder_id
                    .as_deref()
                    .is_some_and(|folder_id| members.contains(folder_id))
            })
            .collect();
        let has_children = subtree.len() > 1 || !contained.is_empty();

        if has_children && !recursive {
            info!(
                "event=folder_delete module=tree status=needs_confirmation id={} documents={}",
                id,
                contained.len()
            );
            return Ok(DeleteFolderOutcome::NeedsConfirmation {
                document_count: contained.len(),
            });
        }

        let mut documents_removed = 0;
        for document in &contained {
            if self.documents.delete_document(&document.id)? {
                documents_removed += 1;
            }
        }
        let mut folders_removed = 0;
        for folder_id in subtree.iter().rev() {
            if self.store.delete::<Folder>(folder_id)? {
                folders_removed += 1;
            }
        }

        info!(
            "event=folder_delete module=tree status=ok id={} folders={} documents={}",
            id, folders_removed, documents_removed
        );
        Ok(DeleteFolderOutcome::Deleted {
            folders_removed,
            documents_removed,
        })
    }

    /// Direct children of `folder_id` (`None` = root), sorted by name then id.
    pub fn list_children(&self, folder_id: Option<&str>) -> VaultResult<FolderChildren> {
        let folder_id = folder_id.filter(|value| !value.is_empty());
        if let Some(id) = folder_id {
            self.get_folder(id)?;
        }

        let mut folders: Vec<Folder> = self
            .store
            .load::<Folder>()?
            .into_iter()
            .filter(|folder| folder.parent_id.as_deref() == folder_id)
            .collect();
        sort_folders(&mut folders);

        let mut documents: Vec<Document> = self
            .store
            .load::<Document>()?
            .into_iter()
            .filter(|document| document.folder_id.as_deref() == folder_id)
            .collect();
        documents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        Ok(FolderChildren { folders, documents })
    }

    /// Ancestor chain of `id`, root first and `id` last.
    ///
    /// Stops early at a missing parent or a cycle.
    pub fn folder_path(&self, id: &str) -> VaultResult<Vec<Folder>> {
        let folders = self.store.load::<Folder>()?;
        let by_id: HashMap<&str, &Folder> = folders
            .iter()
            .map(|folder| (folder.id.as_str(), folder))
            .collect();
        if !by_id.contains_key(id) {
            return Err(VaultError::folder_not_found(id));
        }

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(folder) = by_id.get(current) else {
                break;
            };
            if !visited.insert(current) {
                break;
            }
            path.push((*folder).clone());
            cursor = folder.parent_id.as_deref();
        }
        path.reverse();
        Ok(path)
    }

    /// Number of documents in `id` and all of its descendants.
    pub fn subtree_document_count(&self, id: &str) -> VaultResult<usize> {
        let arena = self.arena()?;
        if !arena.contains(id) {
            return Err(VaultError::folder_not_found(id));
        }
        let members: HashSet<EntityId> = arena.subtree(id).into_iter().collect();
        Ok(self
            .store
            .load::<Document>()?
            .iter()
            .filter(|document| {
                document
                    .folder_id
                    .as_ref()
                    .is_some_and(|folder_id| members.contains(folder_id))
            })
            .count())
    }

    fn lock_hierarchy(&self) -> MutexGuard<'_, ()> {
        self.hierarchy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn arena(&self) -> VaultResult<FolderArena> {
        Ok(FolderArena::from_folders(&self.store.load::<Folder>()?))
    }

    /// Writes copied folders top-down, then copied documents; returns the
    /// number of documents written.
    fn write_copies(
        &self,
        subtree: &[EntityId],
        id_map: &HashMap<&str, EntityId>,
        by_id: &HashMap<&str, &Folder>,
        target: Option<&str>,
        root_name: String,
    ) -> VaultResult<usize> {
        let mut root_name = Some(root_name);
        for (position, original_id) in subtree.iter().enumerate() {
            let (Some(original), Some(new_id)) = (
                by_id.get(original_id.as_str()),
                id_map.get(original_id.as_str()),
            ) else {
                continue;
            };
            let mut copy = Folder::with_id(new_id.clone(), original.name.clone());
            if position == 0 {
                copy.parent_id = target.map(str::to_string);
                if let Some(name) = root_name.take() {
                    copy.name = name;
                }
            } else {
                copy.parent_id = original
                    .parent_id
                    .as_deref()
                    .and_then(|parent| id_map.get(parent))
                    .cloned();
            }
            self.store.save(copy)?;
        }

        let mut copied = 0;
        for original in self.store.load::<Document>()? {
            let Some(new_folder) = original
                .folder_id
                .as_deref()
                .and_then(|folder_id| id_map.get(folder_id))
            else {
                continue;
            };
            let mut copy = Document::new(original.name, original.content);
            copy.folder_id = Some(new_folder.clone());
            copy.annotations = original.annotations;
            self.documents.save_document(copy)?;
            copied += 1;
        }
        Ok(copied)
    }
}

fn sort_folders(folders: &mut [Folder]) {
    folders.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::FolderArena;
    use crate::model::folder::Folder;

    fn arena(pairs: &[(&str, Option<&str>)]) -> FolderArena {
        let folders: Vec<Folder> = pairs
            .iter()
            .map(|(id, parent)| {
                let folder = Folder::with_id(*id, *id);
                match parent {
                    Some(parent) => folder.in_parent(*parent),
                    None => folder,
                }
            })
            .collect();
        FolderArena::from_folders(&folders)
    }

    #[test]
    fn containment_follows_ancestor_chain() {
        let arena = arena(&[("a", None), ("b", Some("a")), ("c", Some("b")), ("d", None)]);
        assert!(arena.is_within("c", "a"));
        assert!(arena.is_within("a", "a"));
        assert!(!arena.is_within("a", "c"));
        assert!(!arena.is_within("d", "a"));
    }

    #[test]
    fn subtree_lists_parents_before_children() {
        let arena = arena(&[("a", None), ("b", Some("a")), ("c", Some("b")), ("e", Some("a"))]);
        let order = arena.subtree("a");
        assert_eq!(order.first().map(String::as_str), Some("a"));
        let pos = |id: &str| order.iter().position(|value| value == id);
        assert!(pos("b") < pos("c"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn walks_terminate_on_existing_cycles() {
        let arena = arena(&[("x", Some("y")), ("y", Some("x")), ("z", None)]);
        assert!(arena.is_within("x", "z"));
        assert_eq!(arena.subtree("x").len(), 2);
        let members = arena.cycle_members();
        assert!(members.contains("x") && members.contains("y"));
        assert!(!members.contains("z"));
    }
}
