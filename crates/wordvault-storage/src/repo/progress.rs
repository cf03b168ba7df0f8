use wordvault_model::{progress_doc_id, UserWordProgress};

use super::decode_lenient;
use crate::{
    commit_chunked, get_as, set_from, to_fields, DocumentStore, Query, StoreResult, WriteOp,
    USER_WORDS,
};

pub struct ProgressRepo<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProgressRepo<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str, word_id: &str) -> StoreResult<Option<UserWordProgress>> {
        get_as(self.store, USER_WORDS, &progress_doc_id(user_id, word_id)).await
    }

    /// Stored progress, or a fresh `New` record that is not yet persisted.
    pub async fn get_or_new(&self, user_id: &str, word_id: &str) -> StoreResult<UserWordProgress> {
        Ok(self
            .get(user_id, word_id)
            .await?
            .unwrap_or_else(|| UserWordProgress::new(user_id, word_id)))
    }

    pub async fn save(&self, progress: &UserWordProgress) -> StoreResult<()> {
        set_from(self.store, USER_WORDS, &progress.doc_id(), progress).await
    }

    pub async fn save_all(&self, records: &[UserWordProgress]) -> StoreResult<usize> {
        let ops = records
            .iter()
            .map(|p| Ok(WriteOp::set(USER_WORDS, &p.doc_id(), to_fields(p)?)))
            .collect::<StoreResult<Vec<_>>>()?;
        commit_chunked(self.store, ops).await
    }

    pub async fn list_for_user(&self, user_id: &str) -> StoreResult<Vec<UserWordProgress>> {
        let query = Query::collection(USER_WORDS).where_eq("userId", user_id);
        let docs = self.store.query(&query).await?;
        Ok(decode_lenient(USER_WORDS, &docs, |doc| doc.decode(USER_WORDS)))
    }
}
