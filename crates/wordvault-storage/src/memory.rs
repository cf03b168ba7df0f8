//! In-process document store with optional JSON snapshot persistence.
//!
//! Snapshot layout: `{ "<collection>": { "<id>": { ...fields } } }`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{
    generate_id, Document, DocumentStore, Fields, Query, StoreError, StoreResult, WriteBatch,
    WriteOp,
};

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

pub struct MemoryStore {
    collections: RwLock<Collections>,
    snapshot_path: Option<PathBuf>,
    /// Held across serialize + persist so snapshots land in mutation order.
    flush_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store; nothing is written to disk.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
            flush_lock: Mutex::new(()),
        }
    }

    /// Store persisted to `path`. Loads the snapshot when the file exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let collections = if path.exists() {
            let text = fs::read_to_string(path)?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str::<Collections>(&text)?
            }
        } else {
            BTreeMap::new()
        };

        info!(
            path = %path.display(),
            collections = collections.len(),
            "opened file-backed document store"
        );

        Ok(Self {
            collections: RwLock::new(collections),
            snapshot_path: Some(path.to_path_buf()),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Writes the snapshot file through a unique temp file in the same
    /// directory, then renames it over `path`. No-op for volatile stores.
    pub fn flush(&self) -> StoreResult<()> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let _flushing = self.flush_lock.lock();
        let json = {
            let guard = self.collections.read();
            serde_json::to_vec_pretty(&*guard)?
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!(path = %path.display(), bytes = json.len(), "flushed document snapshot");
        Ok(())
    }

    fn apply_op(collections: &mut Collections, op: WriteOp) -> StoreResult<()> {
        match op {
            WriteOp::Set {
                collection,
                id,
                fields,
            } => {
                collections.entry(collection).or_default().insert(id, fields);
            }
            WriteOp::Merge {
                collection,
                id,
                fields,
            } => {
                let existing = collections
                    .get_mut(&collection)
                    .and_then(|c| c.get_mut(&id))
                    .ok_or_else(|| StoreError::NotFound {
                        collection: collection.clone(),
                        id: id.clone(),
                    })?;
                for (k, v) in fields {
                    existing.insert(k, v);
                }
            }
            WriteOp::Delete { collection, id } => {
                if let Some(c) = collections.get_mut(&collection) {
                    c.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn write(&self, op: WriteOp) -> StoreResult<()> {
        {
            let mut guard = self.collections.write();
            Self::apply_op(&mut guard, op)?;
        }
        self.flush()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        if self.snapshot_path.is_some() {
            "file"
        } else {
            "memory"
        }
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let guard = self.collections.read();
        Ok(guard
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.write(WriteOp::set(collection, id, fields))
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.write(WriteOp::merge(collection, id, fields))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.write(WriteOp::delete(collection, id))
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        let id = generate_id();
        self.write(WriteOp::set(collection, &id, fields))?;
        Ok(id)
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let docs: Vec<Document> = {
            let guard = self.collections.read();
            match guard.get(&query.collection) {
                Some(c) => c
                    .iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };
        Ok(query.apply(docs))
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        {
            let mut guard = self.collections.write();

            // Stage only the touched collections so a failing op leaves the store unchanged.
            let touched: BTreeSet<String> = batch
                .ops()
                .iter()
                .map(|op| op.collection().to_string())
                .collect();
            let mut staged: Collections = touched
                .iter()
                .map(|name| (name.clone(), guard.get(name).cloned().unwrap_or_default()))
                .collect();

            for op in batch.into_ops() {
                Self::apply_op(&mut staged, op)?;
            }
            for (name, docs) in staged {
                guard.insert(name, docs);
            }
        }
        self.flush()
    }
}
