//! WordVault document storage
//!
//! Every persistent record lives in a Firestore-shaped document store:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      DOCUMENT STORAGE                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  route handlers / admin jobs                                     │
//! │        │                                                         │
//! │        ▼                                                         │
//! │  ┌────────────┐   typed reads/writes   ┌──────────────────────┐  │
//! │  │   repo::*  │───────────────────────►│  dyn DocumentStore   │  │
//! │  └────────────┘                        ├──────────┬───────────┤  │
//! │                                        │ Memory   │ Firestore │  │
//! │                                        │ (+ JSON  │ (REST v1) │  │
//! │                                        │  file)   │           │  │
//! │                                        └──────────┴───────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - `MemoryStore` backs tests and single-node deployments; with a snapshot
//!   path it rewrites a JSON file after each mutation.
//! - `FirestoreStore` talks to Firestore (or its emulator) over REST.
//! - Write batches hold at most `MAX_BATCH_OPS` operations; bulk jobs go
//!   through `commit_chunked` / `delete_where`.

pub mod batch;
pub mod firestore;
pub mod memory;
pub mod query;
pub mod repo;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub use batch::{commit_chunked, delete_where, WriteBatch, WriteOp, MAX_BATCH_OPS};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};

// ============================================================================
// Collection names
// ============================================================================

pub const WORDS: &str = "words";
pub const WORDS_V3: &str = "words_v3";
pub const AI_GENERATED_WORDS: &str = "ai_generated_words";
pub const VOCABULARY_COLLECTIONS: &str = "vocabulary_collections";
pub const VOCABULARY_WORDS: &str = "vocabulary_words";
pub const USER_WORDS: &str = "user_words";
pub const PERSONAL_COLLECTION_WORDS: &str = "personal_collection_words";
pub const PHOTO_VOCABULARY_WORDS: &str = "photo_vocabulary_words";

/// Word collections written before `words_v3`, oldest first.
pub const LEGACY_WORD_COLLECTIONS: &[&str] = &[WORDS, AI_GENERATED_WORDS, VOCABULARY_WORDS];

// ============================================================================
// Core Types
// ============================================================================

/// Top-level fields of a document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Fields as a JSON object (for serde conversions).
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> StoreResult<T> {
        serde_json::from_value(self.to_value()).map_err(|e| StoreError::InvalidDocument {
            collection: collection.to_string(),
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("write batch holds {0} operations (max {MAX_BATCH_OPS})")]
    BatchTooLarge(usize),
    #[error("invalid document {collection}/{id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },
    #[error("invalid word {id}: {source}")]
    InvalidWord {
        id: String,
        source: wordvault_model::ValidationError,
    },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Store Interface
// ============================================================================

/// Firestore-shaped document store.
///
/// Document ids are opaque strings; collections are created on first write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend label for status endpoints and logs.
    fn backend_name(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Creates or replaces a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Overwrites the given top-level fields of an existing document.
    ///
    /// Returns `StoreError::NotFound` when the document does not exist.
    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Inserts a document under a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Applies all operations or none of them.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Serializes a value into top-level document fields.
pub fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "expected a JSON object for document fields, got {other}"
        ))),
    }
}

/// Reads and deserializes a document.
pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> StoreResult<Option<T>> {
    match store.get(collection, id).await? {
        Some(doc) => doc.decode(collection).map(Some),
        None => Ok(None),
    }
}

/// Serializes and writes a document (create or replace).
pub async fn set_from<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    value: &T,
) -> StoreResult<()> {
    store.set(collection, id, to_fields(value)?).await
}

/// Firestore-style auto id: 20 alphanumeric characters.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..20].to_string()
}
