//! Integration tests across the WordVault crates
//!
//! - Upload pipeline → word repository → study session
//! - Legacy documents → normalized reads
//! - File-backed store persistence
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::tempdir;

use wordvault_ingest_docs::{ExtractionPipeline, FixedOcr, Strategy, UploadedFile};
use wordvault_llm::{EnrichField, MockProvider, WordEnricher};
use wordvault_model::{Category, StudyStatus, UnifiedWord, VocabularyCollection, WordSource};
use wordvault_storage::repo::{CollectionRepo, ProgressRepo, WordRepo};
use wordvault_storage::{DocumentStore, MemoryStore, AI_GENERATED_WORDS, WORDS, WORDS_V3};
use wordvault_study::{
    build_deck, check_typing, generate_quiz, grade_quiz, record_answer, summarize, DeckOptions,
    QuizAnswer, QuizKind, QuizOptions,
};

fn fields(v: serde_json::Value) -> wordvault_storage::Fields {
    v.as_object().cloned().unwrap()
}

// ============================================================================
// Upload → storage → study
// ============================================================================

#[tokio::test]
async fn test_photo_list_to_quiz() {
    let ocr_text = "abate - to lessen in intensity\n\
                    candid - truthful and straightforward\n\
                    laconic - using very few words\n\
                    zeal - great energy for a cause\n";
    let pipeline = ExtractionPipeline::new().with_ocr(Arc::new(FixedOcr::new(ocr_text)));
    let upload = UploadedFile::new("page.png", Some("image/png"), b"\x89PNG\r\n\x1a\n0000".to_vec());

    let report = pipeline.run(&upload).await.unwrap();
    assert_eq!(report.strategy, Strategy::Heuristics);
    assert_eq!(report.words.len(), 4);

    let store = MemoryStore::new();
    let words = WordRepo::new(&store);
    for c in &report.words {
        let mut w = UnifiedWord::new("", &c.word, WordSource::PhotoUpload)
            .with_definition(c.definition.as_deref().unwrap());
        w.add_to_collection("photo-1");
        words.create(w).await.unwrap();
    }

    let listed = words.list_by_collection("photo-1", None).await.unwrap();
    assert_eq!(
        listed.iter().map(|w| w.word.as_str()).collect::<Vec<_>>(),
        vec!["abate", "candid", "laconic", "zeal"]
    );

    let options = QuizOptions {
        count: 4,
        kind: QuizKind::DefinitionToWord,
        seed: Some(11),
    };
    let questions = generate_quiz(&listed, &options).unwrap();
    assert_eq!(questions.len(), 4);

    let answers: Vec<QuizAnswer> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| QuizAnswer {
            word_id: q.word_id.clone(),
            kind: q.kind,
            // One deliberate miss.
            answer: if i == 0 {
                "wrong".to_string()
            } else {
                q.choices[q.answer_index].clone()
            },
        })
        .collect();
    let result = grade_quiz(&answers, &listed).unwrap();
    assert_eq!(result.correct, 3);

    let progress_repo = ProgressRepo::new(&store);
    let now = Utc::now();
    for r in &result.results {
        let mut p = progress_repo.get_or_new("alice", &r.word_id).await.unwrap();
        record_answer(&mut p, r.correct, now);
        progress_repo.save(&p).await.unwrap();
    }

    let progress = progress_repo.list_for_user("alice").await.unwrap();
    let stats = summarize(&progress, listed.len(), now);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.learning, 4);
    assert!((stats.accuracy_percent - 75.0).abs() < f64::EPSILON);

    // Missed word comes back first once its short retry interval passes.
    let later = now + Duration::hours(1);
    let deck = build_deck(&listed, &progress, &DeckOptions::default(), later);
    assert_eq!(deck[0].word.id, result.results[0].word_id);
    assert!(deck[0].due);
}

#[tokio::test]
async fn test_mastery_after_streak_and_typing() {
    let store = MemoryStore::new();
    let word = WordRepo::new(&store)
        .create(UnifiedWord::new("", "venerate", WordSource::Official).with_definition("to respect deeply."))
        .await
        .unwrap();

    let repo = ProgressRepo::new(&store);
    let mut p = repo.get_or_new("bob", &word.id).await.unwrap();
    let mut now = Utc::now();
    for answer in ["venerate", "Venerate", " venerate "] {
        assert!(check_typing(&word.word, answer).is_correct());
        record_answer(&mut p, true, now);
        now += Duration::days(30);
    }
    assert_eq!(p.status, StudyStatus::Mastered);

    assert!(!check_typing(&word.word, "venerat").is_correct());
    record_answer(&mut p, false, now);
    assert_eq!(p.status, StudyStatus::Reviewing);
    repo.save(&p).await.unwrap();
    assert_eq!(repo.get("bob", &word.id).await.unwrap().unwrap().streak, 0);
}

// ============================================================================
// Enrichment
// ============================================================================

#[tokio::test]
async fn test_enrichment_through_mock_provider() {
    let provider = Arc::new(MockProvider::always(
        &json!({
            "partsOfSpeech": ["adjective"],
            "definitions": [{ "text": "lasting a very short time.", "partOfSpeech": "adjective" }],
            "synonyms": ["fleeting", "ephemeral"],
            "antonyms": ["permanent"],
            "examples": ["Fame is ephemeral."],
            "etymology": "Greek ephēmeros, lasting a day.",
            "difficulty": 7,
            "pronunciation": "/ɪˈfem(ə)rəl/"
        })
        .to_string(),
    ));
    let enricher = WordEnricher::new(provider);
    let mut word = UnifiedWord::new("e1", "ephemeral", WordSource::Manual);

    let missing = EnrichField::missing_in(&word);
    let changed = enricher.enrich_word(&mut word, &missing).await.unwrap();
    assert!(changed.contains(&EnrichField::Definitions));
    assert_eq!(word.primary_definition(), Some("lasting a very short time."));
    assert_eq!(word.synonyms, vec!["fleeting".to_string()]);
    assert!(word.validate().is_ok());

    let store = MemoryStore::new();
    WordRepo::new(&store).save(&word).await.unwrap();
    let stored = WordRepo::new(&store).find_by_term("EPHEMERAL").await.unwrap().unwrap();
    assert_eq!(stored.etymology.as_deref(), Some("Greek ephēmeros, lasting a day."));
}

// ============================================================================
// Legacy shapes and persistence
// ============================================================================

#[tokio::test]
async fn test_legacy_documents_read_as_unified_words() {
    let store = MemoryStore::new();
    store
        .set(WORDS, "old-1", fields(json!({ "term": "Candid", "meaning": "honest", "synonyms": "frank; open" })))
        .await
        .unwrap();
    store
        .set(AI_GENERATED_WORDS, "ai-1", fields(json!({ "word": "zeal", "definition": "great energy" })))
        .await
        .unwrap();

    let repo = WordRepo::new(&store);
    let candid = repo.get("old-1").await.unwrap().unwrap();
    assert_eq!(candid.normalized, "candid");
    assert_eq!(candid.source, WordSource::Legacy);
    assert_eq!(candid.synonyms, vec!["frank".to_string(), "open".to_string()]);

    let zeal = repo.get("ai-1").await.unwrap().unwrap();
    assert_eq!(zeal.source, WordSource::AiGenerated);
    assert_eq!(zeal.primary_definition(), Some("great energy"));

    // Reads never write back.
    assert!(store.get(WORDS_V3, "old-1").await.unwrap().is_none());

    repo.delete("old-1").await.unwrap();
    assert!(repo.get("old-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wordvault.json");

    {
        let store = MemoryStore::open(&path).unwrap();
        let mut toefl = VocabularyCollection::official("toefl-1", "TOEFL day 1", Category::Toefl);
        CollectionRepo::new(&store).save(&mut toefl).await.unwrap();

        let mut personal = VocabularyCollection::personal("", "Mine", "alice");
        let collections = CollectionRepo::new(&store);
        collections.save(&mut personal).await.unwrap();

        let word = WordRepo::new(&store)
            .create(UnifiedWord::new("", "laconic", WordSource::Manual).with_definition("brief."))
            .await
            .unwrap();
        collections
            .add_personal_word(&personal.id, &word.id, "alice")
            .await
            .unwrap();
    }
    assert!(path.exists());

    let store = MemoryStore::open(&path).unwrap();
    let collections = CollectionRepo::new(&store);
    let official = collections.list(Some(Category::Toefl)).await.unwrap();
    assert_eq!(official.len(), 1);

    let mine = collections.list_personal("alice").await.unwrap();
    assert_eq!(mine.len(), 1);
    let ids = collections.personal_word_ids(&mine[0].id).await.unwrap();
    assert_eq!(ids.len(), 1);

    let removed = collections.delete_personal(&mine[0].id).await.unwrap();
    assert_eq!(removed, 2);
    assert!(collections.list_personal("alice").await.unwrap().is_empty());
    // Words outlive the collections that referenced them.
    assert!(WordRepo::new(&store).find_by_term("laconic").await.unwrap().is_some());
}
