//! Typed repositories over a `DocumentStore`.
//!
//! Each repository borrows the store and speaks in model types. Single-document
//! reads surface decode failures as `StoreError::InvalidDocument`; list reads
//! log and skip documents that fail to decode.

use tracing::warn;

use crate::{Document, StoreResult};

mod collections;
mod photos;
mod progress;
mod words;

pub use collections::CollectionRepo;
pub use photos::PhotoRepo;
pub use progress::ProgressRepo;
pub use words::{decode_word, WordRepo};

/// Decodes every document it can; the rest are logged and dropped.
pub(crate) fn decode_lenient<T>(
    collection: &str,
    docs: &[Document],
    mut decode: impl FnMut(&Document) -> StoreResult<T>,
) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match decode(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(collection, id = %doc.id, error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}
