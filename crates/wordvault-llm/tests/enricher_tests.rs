//! WordEnricher behaviour against scripted provider answers.

use std::sync::Arc;

use wordvault_llm::{EnrichField, LlmError, MockProvider, WordEnricher};
use wordvault_model::{UnifiedWord, WordSource};

const ABATE_DETAILS: &str = r#"```json
{
  "partsOfSpeech": ["verb"],
  "definitions": [
    {"text": "to become less intense or widespread", "partOfSpeech": "verb", "translation": "약해지다"},
    "to reduce in amount"
  ],
  "etymology": "From Old French abatre, to beat down.",
  "synonyms": ["subside", "lessen", "Subside", "abate"],
  "antonyms": ["intensify"],
  "examples": [{"sentence": "The storm abated overnight.", "translation": "폭풍이 밤새 잦아들었다."}],
  "difficulty": "7",
  "pronunciation": "/əˈbeɪt/"
}
```"#;

fn enricher(responses: &[&str]) -> (WordEnricher, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::new(
        responses.iter().map(|s| s.to_string()).collect(),
    ));
    (WordEnricher::new(provider.clone()), provider)
}

#[tokio::test]
async fn test_details_parses_fenced_answer_and_cleans_lists() {
    let (enricher, _) = enricher(&[ABATE_DETAILS]);
    let details = enricher.details("abate").await.unwrap();

    assert_eq!(details.definitions.len(), 2);
    assert_eq!(details.definitions[0].translation.as_deref(), Some("약해지다"));
    assert_eq!(details.synonyms, vec!["subside", "lessen"]);
    assert_eq!(details.difficulty, None);
    assert_eq!(details.pronunciation.as_deref(), Some("/əˈbeɪt/"));
}

#[tokio::test]
async fn test_details_without_definitions_is_parse_error() {
    let (enricher, _) = enricher(&[r#"{"definitions": [], "synonyms": ["x"]}"#]);
    assert!(matches!(
        enricher.details("abate").await,
        Err(LlmError::Parse(_))
    ));
}

#[tokio::test]
async fn test_enrich_word_fills_only_requested_fields() {
    let (enricher, provider) = enricher(&[ABATE_DETAILS]);
    let mut word = UnifiedWord::new("w1", "abate", WordSource::Manual);
    word.etymology = Some("kept".into());

    let changed = enricher
        .enrich_word(&mut word, &[EnrichField::Definitions, EnrichField::Synonyms])
        .await
        .unwrap();

    assert_eq!(changed, vec![EnrichField::Definitions, EnrichField::Synonyms]);
    assert_eq!(word.parts_of_speech, vec!["verb"]);
    assert_eq!(word.antonyms, vec!["intensify"]);
    assert_eq!(word.etymology.as_deref(), Some("kept"));
    assert!(word.examples.is_empty());
    assert_eq!(provider.call_count(), 1);
    assert!(provider.requests()[0].json_response);
}

#[tokio::test]
async fn test_enrich_examples_fall_back_to_examples_prompt() {
    let details = r#"{"definitions": ["free from guile"], "examples": []}"#;
    let examples = r#"{"examples": ["She gave a candid answer.", {"sentence": "Be candid with me."}]}"#;
    let (enricher, provider) = enricher(&[details, examples]);
    let mut word = UnifiedWord::new("w2", "candid", WordSource::Manual);

    let changed = enricher
        .enrich_word(&mut word, &EnrichField::ALL)
        .await
        .unwrap();

    assert!(changed.contains(&EnrichField::Examples));
    assert!(!changed.contains(&EnrichField::Etymology));
    assert_eq!(word.examples.len(), 2);
    assert_eq!(provider.call_count(), 2);
    assert!(provider.requests()[1].user_prompt().contains("free from guile"));
}

#[tokio::test]
async fn test_failed_examples_fallback_leaves_word_unchanged() {
    let details = r#"{"definitions": ["free from guile"], "synonyms": ["frank"], "examples": []}"#;
    let (enricher, provider) = enricher(&[details, "no examples today"]);
    let mut word = UnifiedWord::new("w3", "candid", WordSource::Manual);
    let before = word.clone();

    let result = enricher.enrich_word(&mut word, &EnrichField::ALL).await;

    assert!(matches!(result, Err(LlmError::Parse(_))));
    assert_eq!(provider.call_count(), 2);
    assert_eq!(word, before);
}

#[tokio::test]
async fn test_repair_rejects_still_truncated_answer() {
    let (enricher, _) = enricher(&[
        r#"{"definition": "to make less severe and"}"#,
        r#"{"definition": "to make less severe or intense"}"#,
    ]);
    assert!(enricher.repair_definition("mitigate", "to make less...").await.is_err());
    assert_eq!(
        enricher.repair_definition("mitigate", "to make less...").await.unwrap(),
        "to make less severe or intense"
    );
}

#[tokio::test]
async fn test_infer_word_list_dedupes_in_order() {
    let (enricher, provider) = enricher(&[
        r#"{"words": ["Abate", {"word": "candid", "definition": "honest"}, {"word": "abate"}, {"word": "  "}]}"#,
    ]);
    let words = enricher.infer_word_list("1. abate\n2. candid - honest").await.unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0].word, "Abate");
    assert_eq!(words[1].definition.as_deref(), Some("honest"));
    assert!(provider.requests()[0].user_prompt().contains("2. candid - honest"));
}

#[tokio::test]
async fn test_translate_uses_default_language() {
    let (enricher, provider) = enricher(&[r#"{"translation": "약해지다"}"#]);
    let out = enricher.translate("to lessen", None).await.unwrap();
    assert_eq!(out, "약해지다");
    assert!(provider.requests()[0].user_prompt().contains("into Korean"));
}

#[tokio::test]
async fn test_enrich_many_keeps_input_order_and_isolates_failures() {
    let (enricher, _) = enricher(&[ABATE_DETAILS, "not json at all"]);
    let words: Vec<_> = ["abate", "candid", "zeal", "laconic"]
        .iter()
        .enumerate()
        .map(|(i, w)| UnifiedWord::new(format!("w{i}"), *w, WordSource::Manual))
        .collect();

    let results = enricher
        .enrich_many(words, &[EnrichField::Etymology], 1)
        .await;

    let ids: Vec<_> = results.iter().map(|(w, _)| w.id.as_str()).collect();
    assert_eq!(ids, vec!["w0", "w1", "w2", "w3"]);
    let failures = results.iter().filter(|(_, r)| r.is_err()).count();
    assert_eq!(failures, 2);
}
