//! File-per-record entity store.
//!
//! # Responsibility
//! - Persist each record as `<root>/<kind dir>/<id>.json`.
//! - Serialize writers per record and publish writes atomically.
//!
//! # Invariants
//! - A record file is only ever replaced by rename of a fully written temp
//!   file in the same directory, so readers see the old or the new record.
//! - Every mutation of one record holds that record's lock for the whole
//!   read-merge-write cycle, including commit observers.
//! - Files that are not `*.json` (temp files, editor droppings) are ignored.
//! - Lock entries live while the record exists or a caller holds them; a
//!   delete, or an update of a missing id, drops the entry once no other
//!   caller references it.

use crate::model::record::{validate_id, EntityId, Record, RecordKind};
use crate::model::timestamp;
use crate::repo::entity_store::{EntityStore, StoreError, StoreResult};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Prefix of in-flight temp files inside record directories.
pub const TEMP_FILE_PREFIX: &str = ".scriptorium-tmp";
const RECORD_EXTENSION: &str = "json";
const RECORD_KINDS: [RecordKind; 2] = [RecordKind::Document, RecordKind::Folder];

/// How hard a write tries to reach stable storage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDurability {
    /// Temp file + atomic rename, no fsync.
    #[default]
    BestEffort,
    /// Also fsyncs the temp file before the rename and the directory after it.
    Durable,
}

type RecordKey = (RecordKind, EntityId);

/// Filesystem-backed [`EntityStore`].
#[derive(Debug)]
pub struct FsEntityStore {
    root: PathBuf,
    durability: WriteDurability,
    locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

impl FsEntityStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Side effects
    /// - Creates the per-kind record directories.
    /// - Removes temp files left behind by interrupted writes.
    pub fn open(root: impl Into<PathBuf>, durability: WriteDurability) -> StoreResult<Self> {
        let root = root.into();
        let started_at = Instant::now();
        for kind in RECORD_KINDS {
            let dir = root.join(kind.dir_name());
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            remove_stale_temp_files(&dir)?;
        }
        info!(
            "event=store_open module=store status=ok root={} durability={:?} duration_ms={}",
            root.display(),
            durability,
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            root,
            durability,
            locks: DashMap::new(),
        })
    }

    /// Namespace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    fn record_path(&self, kind: RecordKind, id: &str) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn record_lock(&self, kind: RecordKind, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry((kind, id.to_string()))
            .or_default()
            .clone()
    }

    /// Drops the lock entry for a deleted record unless another caller
    /// still holds it. The map shard stays locked during the check, so no
    /// new holder can appear in between.
    fn release_record_lock(&self, kind: RecordKind, id: &str) {
        let key = (kind, id.to_string());
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn read_record<R: Record>(&self, path: &Path) -> StoreResult<Option<R>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let record: R = serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;

        let expected_stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
        if record.id() != expected_stem {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                detail: format!(
                    "record id `{}` does not match file name `{expected_stem}`",
                    record.id()
                ),
            });
        }
        Ok(Some(record))
    }

    fn write_record<R: Record>(&self, path: &Path, record: &R) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(|err| StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("failed to encode record: {err}"),
        })?;
        write_atomic(path, &bytes, self.durability)
    }
}

impl EntityStore for FsEntityStore {
    fn load<R: Record>(&self) -> StoreResult<Vec<R>> {
        let dir = self.location(R::KIND);
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if is_record_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            // A concurrent delete between listing and reading yields `None`.
            if let Some(record) = self.read_record::<R>(&path)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        validate_id(R::KIND, id)?;
        self.read_record(&self.record_path(R::KIND, id))
    }

    fn save_observed<R, F>(&self, record: R, observe: F) -> StoreResult<R>
    where
        R: Record,
        F: FnOnce(&R),
    {
        record.validate()?;
        let lock = self.record_lock(R::KIND, record.id());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.record_path(R::KIND, record.id());
        let existing = self.read_record::<R>(&path)?;
        let created = existing.is_none();
        let merged = record.merge_onto(existing.as_ref(), timestamp::now());
        self.write_record(&path, &merged)?;
        observe(&merged);

        debug!(
            "event=record_save module=store status=ok kind={} id={} created={}",
            R::KIND,
            merged.id(),
            created
        );
        Ok(merged)
    }

    fn update_observed<R, M, F>(&self, id: &str, mutate: M, observe: F) -> StoreResult<Option<R>>
    where
        R: Record,
        M: FnOnce(&mut R),
        F: FnOnce(&R),
    {
        validate_id(R::KIND, id)?;
        let lock = self.record_lock(R::KIND, id);
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.record_path(R::KIND, id);
        let Some(existing) = self.read_record::<R>(&path)? else {
            drop(guard);
            drop(lock);
            self.release_record_lock(R::KIND, id);
            return Ok(None);
        };
        let mut next = existing.clone();
        mutate(&mut next);
        next.validate()?;

        let merged = next.merge_onto(Some(&existing), timestamp::now());
        self.write_record(&path, &merged)?;
        observe(&merged);

        debug!(
            "event=record_update module=store status=ok kind={} id={}",
            R::KIND,
            id
        );
        Ok(Some(merged))
    }

    fn delete_observed<R, F>(&self, id: &str, observe: F) -> StoreResult<bool>
    where
        R: Record,
        F: FnOnce(bool),
    {
        validate_id(R::KIND, id)?;
        let lock = self.record_lock(R::KIND, id);
        let existed = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let path = self.record_path(R::KIND, id);
            let existed = match fs::remove_file(&path) {
                Ok(()) => true,
                Err(err) if err.kind() == io::ErrorKind::NotFound => false,
                Err(source) => return Err(StoreError::Io { path, source }),
            };
            if existed && self.durability == WriteDurability::Durable {
                sync_dir(&self.location(R::KIND))?;
            }
            observe(existed);
            existed
        };
        drop(lock);
        self.release_record_lock(R::KIND, id);

        debug!(
            "event=record_delete module=store status=ok kind={} id={} existed={}",
            R::KIND,
            id,
            existed
        );
        Ok(existed)
    }

    fn location(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }
}

fn is_record_file(path: &Path) -> bool {
    let is_json = path.extension().and_then(OsStr::to_str) == Some(RECORD_EXTENSION);
    let hidden = path
        .file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with('.'));
    is_json && !hidden && path.is_file()
}

fn write_atomic(path: &Path, contents: &[u8], durability: WriteDurability) -> StoreResult<()> {
    let Some(dir) = path.parent() else {
        return Err(StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::other("record path has no parent"),
        });
    };
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    if durability == WriteDurability::Durable {
        file.as_file().sync_all().map_err(io_err)?;
    }
    // On failure the temp file is dropped (and removed) with the error.
    file.persist(path).map_err(|err| io_err(err.error))?;

    if durability == WriteDurability::Durable {
        sync_dir(dir)?;
    }
    Ok(())
}

fn sync_dir(dir: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        let handle = fs::File::open(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        handle.sync_all().map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

fn remove_stale_temp_files(dir: &Path) -> StoreResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_temp = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|name| name.starts_with(TEMP_FILE_PREFIX));
        if !is_temp {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => warn!(
                "event=store_temp_cleanup module=store status=ok path={}",
                path.display()
            ),
            Err(err) => warn!(
                "event=store_temp_cleanup module=store status=error path={} error={}",
                path.display(),
                err
            ),
        }
    }
    Ok(())
}
