use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;
use wordvault_model::{
    personal_link_id, Category, CollectionKind, PersonalCollectionWord, VocabularyCollection,
};

use super::decode_lenient;
use crate::{
    commit_chunked, delete_where, generate_id, get_as, set_from, Direction, DocumentStore,
    FilterOp, Query, StoreError, StoreResult, WriteOp, PERSONAL_COLLECTION_WORDS,
    VOCABULARY_COLLECTIONS, VOCABULARY_WORDS, WORDS_V3,
};

pub struct CollectionRepo<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CollectionRepo<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<VocabularyCollection>> {
        let collection: Option<VocabularyCollection> =
            get_as(self.store, VOCABULARY_COLLECTIONS, id).await?;
        Ok(collection.map(|mut c| {
            c.id = id.to_string();
            c
        }))
    }

    /// Official collections, optionally of one category, by name.
    pub async fn list(&self, category: Option<Category>) -> StoreResult<Vec<VocabularyCollection>> {
        let mut query = Query::collection(VOCABULARY_COLLECTIONS).where_eq("kind", "official");
        if let Some(category) = category {
            query = query.where_eq("category", category.as_str());
        }
        self.decode_all(&query.order_by("name", Direction::Ascending))
            .await
    }

    /// Personal collections owned by `user_id`, by name.
    pub async fn list_personal(&self, user_id: &str) -> StoreResult<Vec<VocabularyCollection>> {
        let query = Query::collection(VOCABULARY_COLLECTIONS)
            .where_eq("ownerId", user_id)
            .where_eq("kind", "personal")
            .order_by("name", Direction::Ascending);
        self.decode_all(&query).await
    }

    /// Writes a collection, assigning an id when it has none.
    pub async fn save(&self, collection: &mut VocabularyCollection) -> StoreResult<()> {
        if collection.id.is_empty() {
            collection.id = generate_id();
        }
        collection.updated_at = Utc::now();
        set_from(self.store, VOCABULARY_COLLECTIONS, &collection.id, &*collection).await
    }

    pub async fn set_word_count(&self, id: &str, count: u32) -> StoreResult<()> {
        let mut fields = Map::new();
        fields.insert("wordCount".into(), json!(count));
        fields.insert("updatedAt".into(), json!(Utc::now()));
        self.store.merge(VOCABULARY_COLLECTIONS, id, fields).await
    }

    /// Deletes an official collection and its memberships.
    ///
    /// Words keep existing; the collection id is removed from their
    /// `collectionIds` and legacy `vocabulary_words` rows pointing at the
    /// collection are deleted. Returns the number of documents touched.
    pub async fn delete_official(&self, id: &str) -> StoreResult<usize> {
        let members = self
            .store
            .query(
                &Query::collection(WORDS_V3).filter("collectionIds", FilterOp::ArrayContains, id),
            )
            .await?;

        let ops: Vec<WriteOp> = members
            .iter()
            .map(|doc| {
                let remaining: Vec<Value> = doc
                    .fields
                    .get("collectionIds")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter(|v| v.as_str() != Some(id)).cloned().collect())
                    .unwrap_or_default();
                let mut fields = Map::new();
                fields.insert("collectionIds".into(), Value::Array(remaining));
                WriteOp::merge(WORDS_V3, &doc.id, fields)
            })
            .collect();

        let mut touched = commit_chunked(self.store, ops).await?;
        touched += delete_where(
            self.store,
            &Query::collection(VOCABULARY_WORDS).where_eq("collectionId", id),
        )
        .await?;
        self.store.delete(VOCABULARY_COLLECTIONS, id).await?;

        info!(collection = id, touched, "deleted official collection");
        Ok(touched + 1)
    }

    /// Links a word into a personal or photo collection and refreshes its word count.
    pub async fn add_personal_word(
        &self,
        collection_id: &str,
        word_id: &str,
        user_id: &str,
    ) -> StoreResult<PersonalCollectionWord> {
        let link = PersonalCollectionWord {
            collection_id: collection_id.to_string(),
            word_id: word_id.to_string(),
            user_id: user_id.to_string(),
            added_at: Utc::now(),
        };
        set_from(
            self.store,
            PERSONAL_COLLECTION_WORDS,
            &personal_link_id(collection_id, word_id),
            &link,
        )
        .await?;
        self.refresh_word_count(collection_id).await?;
        Ok(link)
    }

    pub async fn remove_personal_word(&self, collection_id: &str, word_id: &str) -> StoreResult<()> {
        let link_id = personal_link_id(collection_id, word_id);
        if self.store.get(PERSONAL_COLLECTION_WORDS, &link_id).await?.is_none() {
            return Err(StoreError::NotFound {
                collection: PERSONAL_COLLECTION_WORDS.to_string(),
                id: link_id,
            });
        }
        self.store.delete(PERSONAL_COLLECTION_WORDS, &link_id).await?;
        self.refresh_word_count(collection_id).await?;
        Ok(())
    }

    /// Word ids of a personal collection in insertion order.
    pub async fn personal_word_ids(&self, collection_id: &str) -> StoreResult<Vec<String>> {
        let query = Query::collection(PERSONAL_COLLECTION_WORDS)
            .where_eq("collectionId", collection_id)
            .order_by("addedAt", Direction::Ascending);
        let links = self.store.query(&query).await?;
        Ok(decode_lenient(PERSONAL_COLLECTION_WORDS, &links, |doc| {
            doc.decode::<PersonalCollectionWord>(PERSONAL_COLLECTION_WORDS)
                .map(|l| l.word_id)
        }))
    }

    /// Deletes a personal collection and all of its links.
    pub async fn delete_personal(&self, collection_id: &str) -> StoreResult<usize> {
        let removed = delete_where(
            self.store,
            &Query::collection(PERSONAL_COLLECTION_WORDS).where_eq("collectionId", collection_id),
        )
        .await?;
        self.store.delete(VOCABULARY_COLLECTIONS, collection_id).await?;
        Ok(removed + 1)
    }

    /// Recounts a collection's members and stores the result in `wordCount`.
    /// Missing collections are ignored.
    pub async fn refresh_word_count(&self, collection_id: &str) -> StoreResult<u32> {
        let Some(collection) = self.get(collection_id).await? else {
            return Ok(0);
        };
        let count = match collection.kind {
            CollectionKind::Official => {
                let members = Query::collection(WORDS_V3).filter(
                    "collectionIds",
                    FilterOp::ArrayContains,
                    collection_id,
                );
                self.store.query(&members).await?.len()
            }
            CollectionKind::Personal | CollectionKind::Photo => {
                self.personal_word_ids(collection_id).await?.len()
            }
        };
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.set_word_count(collection_id, count).await?;
        Ok(count)
    }

    async fn decode_all(&self, query: &Query) -> StoreResult<Vec<VocabularyCollection>> {
        let docs = self.store.query(query).await?;
        Ok(decode_lenient(VOCABULARY_COLLECTIONS, &docs, |doc| {
            doc.decode::<VocabularyCollection>(VOCABULARY_COLLECTIONS)
                .map(|mut c| {
                    c.id = doc.id.clone();
                    c
                })
        }))
    }
}
