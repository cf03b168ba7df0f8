//! WordVault domain model
//!
//! Canonical shapes for everything the service stores:
//! - `UnifiedWord` (the v3 word document) plus its nested definition/example types,
//! - vocabulary collections (official, personal, photo) and membership links,
//! - per-user study progress.
//!
//! Word documents written by older tooling do not share one shape. The
//! `legacy` module maps those documents onto `UnifiedWord`, and `quality`
//! flags definitions that were cut off during earlier imports.

pub mod collection;
pub mod legacy;
pub mod progress;
pub mod quality;
pub mod word;

pub use collection::{
    personal_link_id, Category, CollectionId, CollectionKind, PersonalCollectionWord,
    PhotoVocabularyWord, VocabularyCollection,
};
pub use legacy::{normalize_legacy, NormalizeError};
pub use progress::{progress_doc_id, StudyStatus, UserId, UserWordProgress};
pub use quality::is_truncated_definition;
pub use word::{
    normalize_term, Definition, Example, Pronunciation, UnifiedWord, ValidationError, WordId,
    WordSource, MAX_WORD_CHARS,
};
