use wordvault_model::PhotoVocabularyWord;

use super::decode_lenient;
use crate::{
    commit_chunked, generate_id, to_fields, Direction, DocumentStore, Query, StoreResult, WriteOp,
    PHOTO_VOCABULARY_WORDS,
};

pub struct PhotoRepo<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> PhotoRepo<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Stores captured words, assigning ids to those without one.
    pub async fn save_all(&self, words: &mut [PhotoVocabularyWord]) -> StoreResult<usize> {
        let mut ops = Vec::with_capacity(words.len());
        for word in words.iter_mut() {
            if word.id.is_empty() {
                word.id = generate_id();
            }
            ops.push(WriteOp::set(PHOTO_VOCABULARY_WORDS, &word.id, to_fields(&*word)?));
        }
        commit_chunked(self.store, ops).await
    }

    /// A user's captured words, newest first, optionally for one upload session.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> StoreResult<Vec<PhotoVocabularyWord>> {
        let mut query = Query::collection(PHOTO_VOCABULARY_WORDS).where_eq("userId", user_id);
        if let Some(session) = session_id {
            query = query.where_eq("sessionId", session);
        }
        let query = query.order_by("createdAt", Direction::Descending);
        let docs = self.store.query(&query).await?;
        Ok(decode_lenient(PHOTO_VOCABULARY_WORDS, &docs, |doc| {
            doc.decode::<PhotoVocabularyWord>(PHOTO_VOCABULARY_WORDS)
                .map(|mut w| {
                    w.id = doc.id.clone();
                    w
                })
        }))
    }
}
