//! Write batches and chunked bulk writes.

use tracing::debug;

use crate::{DocumentStore, Fields, Query, StoreError, StoreResult};

/// Firestore's per-commit write limit.
pub const MAX_BATCH_OPS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Field merge into an existing document.
    Merge {
        collection: String,
        id: String,
        fields: Fields,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn set(collection: &str, id: &str, fields: Fields) -> Self {
        Self::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        }
    }

    pub fn merge(collection: &str, id: &str, fields: Fields) -> Self {
        Self::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        Self::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Set { collection, .. }
            | Self::Merge { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }
}

/// Up to `MAX_BATCH_OPS` writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> StoreResult<()> {
        if self.ops.len() >= MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge(self.ops.len() + 1));
        }
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl TryFrom<Vec<WriteOp>> for WriteBatch {
    type Error = StoreError;

    fn try_from(ops: Vec<WriteOp>) -> Result<Self, Self::Error> {
        if ops.len() > MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge(ops.len()));
        }
        Ok(Self { ops })
    }
}

/// Commits `ops` in consecutive batches of at most `MAX_BATCH_OPS`.
///
/// Each batch is atomic; a failure stops the job and earlier batches stay
/// committed. Returns the number of operations written.
pub async fn commit_chunked(store: &dyn DocumentStore, ops: Vec<WriteOp>) -> StoreResult<usize> {
    let total = ops.len();
    let mut written = 0;
    let mut iter = ops.into_iter().peekable();

    while iter.peek().is_some() {
        let chunk: Vec<WriteOp> = iter.by_ref().take(MAX_BATCH_OPS).collect();
        let n = chunk.len();
        store.commit(WriteBatch::try_from(chunk)?).await?;
        written += n;
        debug!(written, total, "committed write batch");
    }

    Ok(written)
}

/// Deletes every document matching `query`, in batches of `MAX_BATCH_OPS`.
pub async fn delete_where(store: &dyn DocumentStore, query: &Query) -> StoreResult<usize> {
    let docs = store.query(query).await?;
    let ops = docs
        .iter()
        .map(|d| WriteOp::delete(&query.collection, &d.id))
        .collect();
    commit_chunked(store, ops).await
}
