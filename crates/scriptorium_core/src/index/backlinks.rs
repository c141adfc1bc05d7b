//! Incrementally maintained backlink index.
//!
//! # Responsibility
//! - Keep the transpose of the document link relation, grouped by target name.
//! - Answer "who links to this document" by the document's current name.
//!
//! # Invariants
//! - After any sequence of `upsert`/`remove`, the index equals one rebuilt
//!   from scratch over the same documents (`snapshot` compares them).
//! - A document never appears in its own backlinks.
//! - Dangling targets (names no document carries) are kept and simply never
//!   resolved.

use crate::index::link_extractor::LinkExtractor;
use crate::model::document::Document;
use crate::model::record::EntityId;
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// One referencing document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlink {
    pub id: EntityId,
    pub name: String,
}

/// Comparable view of the index contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinkSnapshot {
    /// Document id -> current name.
    pub names: BTreeMap<EntityId, String>,
    /// Target name -> referencing document ids.
    pub inbound: BTreeMap<String, BTreeSet<EntityId>>,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    name: String,
    targets: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: HashMap<EntityId, IndexedDocument>,
    inbound: HashMap<String, BTreeSet<EntityId>>,
}

impl IndexState {
    fn insert(&mut self, id: &str, entry: IndexedDocument) {
        self.detach(id);
        for target in &entry.targets {
            self.inbound
                .entry(target.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.documents.insert(id.to_string(), entry);
    }

    fn detach(&mut self, id: &str) -> bool {
        let Some(previous) = self.documents.remove(id) else {
            return false;
        };
        for target in previous.targets {
            if let Some(sources) = self.inbound.get_mut(&target) {
                sources.remove(id);
                if sources.is_empty() {
                    self.inbound.remove(&target);
                }
            }
        }
        true
    }

    fn snapshot(&self) -> BacklinkSnapshot {
        BacklinkSnapshot {
            names: self
                .documents
                .iter()
                .map(|(id, entry)| (id.clone(), entry.name.clone()))
                .collect(),
            inbound: self
                .inbound
                .iter()
                .map(|(name, sources)| (name.clone(), sources.clone()))
                .collect(),
        }
    }
}

/// Backlink index over one namespace.
pub struct BacklinkIndex {
    extractor: Arc<dyn LinkExtractor>,
    state: RwLock<IndexState>,
}

impl BacklinkIndex {
    /// Creates an empty index using `extractor` as link grammar.
    pub fn new(extractor: Arc<dyn LinkExtractor>) -> Self {
        Self {
            extractor,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Link grammar shared with relinking.
    pub fn extractor(&self) -> &dyn LinkExtractor {
        self.extractor.as_ref()
    }

    /// Replaces the whole index with a fresh scan of `documents`.
    ///
    /// Returns the number of indexed documents.
    pub fn rebuild(&self, documents: &[Document]) -> usize {
        let started_at = Instant::now();
        let fresh = self.build_state(documents);
        let count = fresh.documents.len();
        let targets = fresh.inbound.len();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        info!(
            "event=index_rebuild module=index status=ok documents={} targets={} duration_ms={}",
            count,
            targets,
            started_at.elapsed().as_millis()
        );
        count
    }

    /// Re-indexes one saved document.
    pub fn upsert(&self, document: &Document) {
        let entry = IndexedDocument {
            name: document.name.clone(),
            targets: self.extractor.extract(&document.content),
        };
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&document.id, entry);
    }

    /// Drops one deleted document; returns whether it was indexed.
    pub fn remove(&self, id: &str) -> bool {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .detach(id)
    }

    /// Whether `id` is currently indexed.
    pub fn contains(&self, id: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .documents
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .documents
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents linking to the current name of `id`, ordered by name then id.
    ///
    /// Returns `None` when `id` is not indexed.
    pub fn backlinks_of(&self, id: &str) -> Option<Vec<Backlink>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let target = state.documents.get(id)?;
        let mut backlinks: Vec<Backlink> = state
            .inbound
            .get(&target.name)
            .into_iter()
            .flatten()
            .filter(|source| source.as_str() != id)
            .filter_map(|source| {
                state.documents.get(source).map(|entry| Backlink {
                    id: source.clone(),
                    name: entry.name.clone(),
                })
            })
            .collect();
        backlinks.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Some(backlinks)
    }

    /// Ids of documents whose content references `name`.
    pub fn referrers_of_name(&self, name: &str) -> BTreeSet<EntityId> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Current contents in comparable form.
    pub fn snapshot(&self) -> BacklinkSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Contents a full rescan of `documents` would produce.
    pub fn scan(&self, documents: &[Document]) -> BacklinkSnapshot {
        self.build_state(documents).snapshot()
    }

    /// Whether the maintained index matches a full rescan of `documents`.
    pub fn is_consistent_with(&self, documents: &[Document]) -> bool {
        self.snapshot() == self.scan(documents)
    }

    fn build_state(&self, documents: &[Document]) -> IndexState {
        let mut state = IndexState::default();
        for document in documents {
            state.insert(
                &document.id,
                IndexedDocument {
                    name: document.name.clone(),
                    targets: self.extractor.extract(&document.content),
                },
            );
        }
        state
    }
}
