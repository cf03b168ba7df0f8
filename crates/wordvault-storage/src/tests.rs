//! Repository tests against the memory store

use super::*;
use crate::repo::{CollectionRepo, PhotoRepo, ProgressRepo, WordRepo};
use chrono::{Duration, Utc};
use serde_json::json;
use wordvault_model::{
    Category, PhotoVocabularyWord, StudyStatus, UnifiedWord, UserWordProgress,
    VocabularyCollection, WordSource,
};

fn fields(v: Value) -> Fields {
    v.as_object().cloned().unwrap()
}

fn word(id: &str, term: &str, collection: Option<&str>) -> UnifiedWord {
    let mut w = UnifiedWord::new(id, term, WordSource::Official).with_definition("a meaning");
    if let Some(c) = collection {
        w.add_to_collection(c);
    }
    w
}

#[tokio::test]
async fn test_word_get_prefers_v3_then_legacy() {
    let store = MemoryStore::new();
    store
        .set(
            AI_GENERATED_WORDS,
            "old1",
            fields(json!({"term": "Obdurate", "meaning": "stubborn", "synonyms": "stubborn, unyielding"})),
        )
        .await
        .unwrap();

    let repo = WordRepo::new(&store);
    let legacy = repo.get("old1").await.unwrap().unwrap();
    assert_eq!(legacy.normalized, "obdurate");
    assert_eq!(legacy.source, WordSource::AiGenerated);
    assert_eq!(legacy.synonyms, vec!["stubborn", "unyielding"]);

    let mut upgraded = legacy.clone();
    upgraded.etymology = Some("Latin obduratus".into());
    repo.save(&upgraded).await.unwrap();
    let fetched = repo.get("old1").await.unwrap().unwrap();
    assert_eq!(fetched.etymology.as_deref(), Some("Latin obduratus"));

    assert!(repo.get("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_rejects_invalid_word() {
    let store = MemoryStore::new();
    let repo = WordRepo::new(&store);
    let bad = UnifiedWord::new("w1", "abc123", WordSource::Manual);
    let err = repo.save(&bad).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidWord { .. }));
    assert!(store.is_empty(WORDS_V3));
}

#[tokio::test]
async fn test_update_keeps_legacy_headword_editable() {
    let store = MemoryStore::new();
    store
        .set(WORDS, "old3d", fields(json!({"word": "3D printing", "definition": "additive manufacturing"})))
        .await
        .unwrap();
    let repo = WordRepo::new(&store);

    let mut word = repo.get("old3d").await.unwrap().unwrap();
    word.synonyms = vec!["additive manufacturing".to_string()];
    assert!(repo.save(&word).await.is_err());
    repo.update(&word).await.unwrap();
    let stored = store.get(WORDS_V3, "old3d").await.unwrap().unwrap();
    assert_eq!(stored.fields["synonyms"], json!(["additive manufacturing"]));

    // A renamed headword still has to pass the rules.
    word.word = "4D printing".to_string();
    let err = repo.update(&word).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidWord { .. }));

    let err = repo.update(&UnifiedWord::new("missing", "zeal", WordSource::Manual)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_list_reads_skip_undecodable_documents() {
    let store = MemoryStore::new();
    let repo = WordRepo::new(&store);
    for (id, term) in [("1", "abate"), ("2", "abstain")] {
        repo.save(&word(id, term, Some("sat"))).await.unwrap();
    }
    store
        .set(
            WORDS_V3,
            "bad",
            fields(json!({"normalized": "abacus", "definition": "counting frame", "collectionIds": ["sat"]})),
        )
        .await
        .unwrap();
    store
        .set(USER_WORDS, "alice_bad", fields(json!({"userId": "alice", "status": 42})))
        .await
        .unwrap();
    ProgressRepo::new(&store)
        .save(&UserWordProgress::new("alice", "1"))
        .await
        .unwrap();

    let hits = repo.search_prefix("ab", 10).await.unwrap();
    let terms: Vec<_> = hits.iter().map(|w| w.normalized.as_str()).collect();
    assert_eq!(terms, vec!["abate", "abstain"]);
    assert_eq!(repo.list_by_collection("sat", None).await.unwrap().len(), 2);
    assert_eq!(repo.list_all().await.unwrap().len(), 2);
    assert_eq!(ProgressRepo::new(&store).list_for_user("alice").await.unwrap().len(), 1);

    // Direct reads still report the broken document.
    assert!(matches!(
        repo.get("bad").await,
        Err(StoreError::InvalidDocument { .. })
    ));
}

#[tokio::test]
async fn test_find_and_prefix_search() {
    let store = MemoryStore::new();
    let repo = WordRepo::new(&store);
    for (id, term) in [("1", "abate"), ("2", "Aberrant"), ("3", "abstain"), ("4", "candid")] {
        repo.save(&word(id, term, None)).await.unwrap();
    }

    let found = repo.find_by_term("  ABERRANT ").await.unwrap().unwrap();
    assert_eq!(found.id, "2");

    let hits = repo.search_prefix("ab", 10).await.unwrap();
    let terms: Vec<_> = hits.iter().map(|w| w.normalized.as_str()).collect();
    assert_eq!(terms, vec!["abate", "aberrant", "abstain"]);

    assert_eq!(repo.search_prefix("", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_assigns_id() {
    let store = MemoryStore::new();
    let repo = WordRepo::new(&store);
    let created = repo
        .create(UnifiedWord::new("", "Laconic", WordSource::Manual))
        .await
        .unwrap();
    assert_eq!(created.id.len(), 20);
    assert_eq!(repo.get(&created.id).await.unwrap().unwrap().word, "Laconic");
}

#[tokio::test]
async fn test_delete_official_collection_strips_membership() {
    let store = MemoryStore::new();
    let words = WordRepo::new(&store);
    let collections = CollectionRepo::new(&store);

    let mut sat = VocabularyCollection::official("", "SAT core", Category::Sat);
    collections.save(&mut sat).await.unwrap();

    let mut shared = word("w1", "abate", Some(&sat.id));
    shared.add_to_collection("toefl-1");
    words.save(&shared).await.unwrap();
    words.save(&word("w2", "candid", Some(&sat.id))).await.unwrap();
    store
        .set(
            VOCABULARY_WORDS,
            "legacy1",
            fields(json!({"word": "zeal", "collectionId": sat.id.clone()})),
        )
        .await
        .unwrap();

    assert_eq!(words.list_by_collection(&sat.id, None).await.unwrap().len(), 2);

    let touched = collections.delete_official(&sat.id).await.unwrap();
    assert_eq!(touched, 4);
    assert!(collections.get(&sat.id).await.unwrap().is_none());
    assert!(words.list_by_collection(&sat.id, None).await.unwrap().is_empty());
    assert_eq!(
        words.get("w1").await.unwrap().unwrap().collection_ids,
        vec!["toefl-1"]
    );
    assert!(store.get(VOCABULARY_WORDS, "legacy1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_word_delete_recounts_collections() {
    let store = MemoryStore::new();
    let words = WordRepo::new(&store);
    let collections = CollectionRepo::new(&store);

    let mut sat = VocabularyCollection::official("sat", "SAT core", Category::Sat);
    collections.save(&mut sat).await.unwrap();
    let mut mine = VocabularyCollection::personal("mine", "Hard words", "alice");
    collections.save(&mut mine).await.unwrap();

    for (id, term) in [("w1", "abate"), ("w2", "candid")] {
        words.save(&word(id, term, Some("sat"))).await.unwrap();
        collections.add_personal_word("mine", id, "alice").await.unwrap();
    }
    assert_eq!(collections.refresh_word_count("sat").await.unwrap(), 2);
    assert_eq!(collections.get("mine").await.unwrap().unwrap().word_count, 2);

    words.delete("w1").await.unwrap();

    assert_eq!(collections.get("sat").await.unwrap().unwrap().word_count, 1);
    assert_eq!(collections.get("mine").await.unwrap().unwrap().word_count, 1);
    assert_eq!(collections.personal_word_ids("mine").await.unwrap(), vec!["w2"]);
    assert!(matches!(words.delete("w1").await, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_personal_collection_links_and_counts() {
    let store = MemoryStore::new();
    let collections = CollectionRepo::new(&store);

    let mut mine = VocabularyCollection::personal("", "Hard words", "alice");
    collections.save(&mut mine).await.unwrap();
    collections.add_personal_word(&mine.id, "w1", "alice").await.unwrap();
    collections.add_personal_word(&mine.id, "w2", "alice").await.unwrap();
    collections.add_personal_word(&mine.id, "w1", "alice").await.unwrap();

    assert_eq!(collections.personal_word_ids(&mine.id).await.unwrap().len(), 2);
    assert_eq!(collections.get(&mine.id).await.unwrap().unwrap().word_count, 2);

    collections.remove_personal_word(&mine.id, "w2").await.unwrap();
    assert_eq!(collections.get(&mine.id).await.unwrap().unwrap().word_count, 1);
    assert!(matches!(
        collections.remove_personal_word(&mine.id, "w2").await,
        Err(StoreError::NotFound { .. })
    ));

    assert_eq!(collections.list_personal("alice").await.unwrap().len(), 1);
    assert!(collections.list_personal("bob").await.unwrap().is_empty());
    assert!(collections.list(None).await.unwrap().is_empty());

    assert_eq!(collections.delete_personal(&mine.id).await.unwrap(), 2);
    assert!(store.is_empty(PERSONAL_COLLECTION_WORDS));
}

#[tokio::test]
async fn test_progress_round_trip() {
    let store = MemoryStore::new();
    let repo = ProgressRepo::new(&store);

    let fresh = repo.get_or_new("alice", "w1").await.unwrap();
    assert_eq!(fresh.status, StudyStatus::New);
    assert!(store.is_empty(USER_WORDS));

    let mut p = UserWordProgress::new("alice", "w1");
    p.status = StudyStatus::Learning;
    p.next_review_at = Some(Utc::now() + Duration::days(1));
    let other = UserWordProgress::new("bob", "w1");
    assert_eq!(repo.save_all(&[p.clone(), other]).await.unwrap(), 2);

    assert_eq!(repo.get("alice", "w1").await.unwrap(), Some(p));
    assert_eq!(repo.list_for_user("alice").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_photo_words_listed_newest_first() {
    let store = MemoryStore::new();
    let repo = PhotoRepo::new(&store);
    let now = Utc::now();
    let mut batch: Vec<PhotoVocabularyWord> = ["ephemeral", "ubiquitous"]
        .iter()
        .enumerate()
        .map(|(i, w)| PhotoVocabularyWord {
            id: String::new(),
            user_id: "alice".into(),
            session_id: "s1".into(),
            word: w.to_string(),
            definition: None,
            source_text: format!("{w} line"),
            created_at: now + Duration::seconds(i as i64),
        })
        .collect();
    assert_eq!(repo.save_all(&mut batch).await.unwrap(), 2);
    assert!(batch.iter().all(|w| !w.id.is_empty()));

    let listed = repo.list_for_user("alice", Some("s1")).await.unwrap();
    assert_eq!(listed[0].word, "ubiquitous");
    assert!(repo.list_for_user("alice", Some("s2")).await.unwrap().is_empty());
}
