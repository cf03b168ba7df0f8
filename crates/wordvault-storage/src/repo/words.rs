use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;
use wordvault_model::{normalize_legacy, normalize_term, UnifiedWord, ValidationError, WordSource};

use super::{decode_lenient, CollectionRepo};
use crate::{
    commit_chunked, delete_where, generate_id, to_fields, Direction, Document, DocumentStore,
    FilterOp, Query, StoreError, StoreResult, WriteOp, AI_GENERATED_WORDS, LEGACY_WORD_COLLECTIONS,
    PERSONAL_COLLECTION_WORDS, WORDS_V3,
};

/// Upper bound appended to a prefix for range scans.
const PREFIX_END: char = '\u{f8ff}';

pub struct WordRepo<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> WordRepo<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Reads a word from `words_v3`, falling back to the legacy collections.
    pub async fn get(&self, id: &str) -> StoreResult<Option<UnifiedWord>> {
        if let Some(doc) = self.store.get(WORDS_V3, id).await? {
            return decode_word(WORDS_V3, &doc).map(Some);
        }
        for collection in LEGACY_WORD_COLLECTIONS {
            if let Some(doc) = self.store.get(collection, id).await? {
                debug!(collection, id, "word served from legacy collection");
                return decode_word(collection, &doc).map(Some);
            }
        }
        Ok(None)
    }

    /// Validates and writes a word to `words_v3` (create or replace).
    pub async fn save(&self, word: &UnifiedWord) -> StoreResult<()> {
        word.validate().map_err(|e| invalid_word(word, e))?;
        self.store.set(WORDS_V3, &word.id, to_fields(word)?).await
    }

    /// Rewrites an existing word into `words_v3`.
    ///
    /// The headword is only re-checked when it differs from the stored one, so
    /// words read from older collections stay editable.
    pub async fn update(&self, word: &UnifiedWord) -> StoreResult<()> {
        let stored = self.get(&word.id).await?.ok_or_else(|| StoreError::NotFound {
            collection: WORDS_V3.to_string(),
            id: word.id.clone(),
        })?;
        if stored.word != word.word {
            word.validate_headword().map_err(|e| invalid_word(word, e))?;
        }
        word.validate_content().map_err(|e| invalid_word(word, e))?;
        self.store.set(WORDS_V3, &word.id, to_fields(word)?).await
    }

    /// Saves a new word, assigning an id when it has none.
    pub async fn create(&self, mut word: UnifiedWord) -> StoreResult<UnifiedWord> {
        if word.id.is_empty() {
            word.id = generate_id();
        }
        word.normalized = normalize_term(&word.word);
        self.save(&word).await?;
        Ok(word)
    }

    /// Saves many words in batches. Invalid words abort before anything is written.
    pub async fn save_all(&self, words: &[UnifiedWord]) -> StoreResult<usize> {
        let mut ops = Vec::with_capacity(words.len());
        for word in words {
            word.validate().map_err(|e| invalid_word(word, e))?;
            ops.push(WriteOp::set(WORDS_V3, &word.id, to_fields(word)?));
        }
        commit_chunked(self.store, ops).await
    }

    /// Exact lookup by normalized headword.
    pub async fn find_by_term(&self, term: &str) -> StoreResult<Option<UnifiedWord>> {
        let key = normalize_term(term);
        if key.is_empty() {
            return Ok(None);
        }
        let query = Query::collection(WORDS_V3).where_eq("normalized", key).limit(1);
        match self.store.query(&query).await?.first() {
            Some(doc) => decode_word(WORDS_V3, doc).map(Some),
            None => Ok(None),
        }
    }

    /// Words whose normalized headword starts with `prefix`, alphabetically.
    pub async fn search_prefix(&self, prefix: &str, limit: usize) -> StoreResult<Vec<UnifiedWord>> {
        let start = normalize_term(prefix);
        let mut query = Query::collection(WORDS_V3);
        if !start.is_empty() {
            let end = format!("{start}{PREFIX_END}");
            query = query
                .filter("normalized", FilterOp::Ge, start)
                .filter("normalized", FilterOp::Lt, end);
        }
        let query = query
            .order_by("normalized", Direction::Ascending)
            .limit(limit);
        self.decode_all(&query).await
    }

    /// Members of an official collection, alphabetically.
    pub async fn list_by_collection(
        &self,
        collection_id: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<UnifiedWord>> {
        let mut query = Query::collection(WORDS_V3)
            .filter("collectionIds", FilterOp::ArrayContains, collection_id)
            .order_by("normalized", Direction::Ascending);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.decode_all(&query).await
    }

    /// Resolves ids in order, skipping ids that no longer exist.
    pub async fn get_many(&self, ids: &[String]) -> StoreResult<Vec<UnifiedWord>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(word) = self.get(id).await? {
                out.push(word);
            }
        }
        Ok(out)
    }

    /// Every `words_v3` document.
    pub async fn list_all(&self) -> StoreResult<Vec<UnifiedWord>> {
        self.decode_all(&Query::collection(WORDS_V3)).await
    }

    /// Raw documents of a legacy collection, for migrations.
    pub async fn scan(&self, collection: &str) -> StoreResult<Vec<Document>> {
        self.store.query(&Query::collection(collection)).await
    }

    /// Removes the word from `words_v3`, every legacy collection and every
    /// personal collection, then recounts the collections that held it.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let word = self.get(id).await?.ok_or_else(|| StoreError::NotFound {
            collection: WORDS_V3.to_string(),
            id: id.to_string(),
        })?;
        let ops = std::iter::once(WORDS_V3)
            .chain(LEGACY_WORD_COLLECTIONS.iter().copied())
            .map(|c| WriteOp::delete(c, id))
            .collect();
        commit_chunked(self.store, ops).await?;

        let links = Query::collection(PERSONAL_COLLECTION_WORDS).where_eq("wordId", id);
        let mut affected: BTreeSet<String> = self
            .store
            .query(&links)
            .await?
            .iter()
            .filter_map(|doc| doc.fields.get("collectionId").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        delete_where(self.store, &links).await?;
        affected.extend(word.collection_ids);

        let collections = CollectionRepo::new(self.store);
        for collection_id in &affected {
            collections.refresh_word_count(collection_id).await?;
        }
        debug!(id, collections = affected.len(), "word deleted");
        Ok(())
    }

    async fn decode_all(&self, query: &Query) -> StoreResult<Vec<UnifiedWord>> {
        let docs = self.store.query(query).await?;
        Ok(decode_lenient(&query.collection, &docs, |doc| {
            decode_word(&query.collection, doc)
        }))
    }
}

fn invalid_word(word: &UnifiedWord, source: ValidationError) -> StoreError {
    StoreError::InvalidWord {
        id: word.id.clone(),
        source,
    }
}

/// Decodes a word document of any known shape.
pub fn decode_word(collection: &str, doc: &Document) -> StoreResult<UnifiedWord> {
    if collection == WORDS_V3 {
        if let Ok(mut word) = doc.decode::<UnifiedWord>(collection) {
            word.id = doc.id.clone();
            return Ok(word);
        }
    }
    let source = if collection == AI_GENERATED_WORDS {
        WordSource::AiGenerated
    } else {
        WordSource::Legacy
    };
    normalize_legacy(&doc.id, &Value::Object(doc.fields.clone()), source).map_err(|e| {
        StoreError::InvalidDocument {
            collection: collection.to_string(),
            id: doc.id.clone(),
            reason: e.to_string(),
        }
    })
}
