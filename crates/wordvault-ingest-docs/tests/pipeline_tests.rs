//! Fallback-chain behaviour with scripted OCR and LLM answers.

use std::sync::Arc;

use wordvault_ingest_docs::{
    AttemptOutcome, ExtractionError, ExtractionPipeline, FileKind, FixedOcr, Strategy,
    UploadedFile,
};
use wordvault_llm::{MockProvider, WordEnricher};

const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const LIST: &str = "Unit 4 Vocabulary\n\
1. abate (v.) to lessen in intensity\n\
2. candid (adj.) truthful and straightforward\n\
3. zeal - great energy or enthusiasm\n\
Page 12";

fn outcomes(report_attempts: &[wordvault_ingest_docs::Attempt]) -> Vec<(Strategy, AttemptOutcome)> {
    report_attempts.iter().map(|a| (a.strategy, a.outcome)).collect()
}

fn llm(answer: &str) -> (WordEnricher, Arc<MockProvider>) {
    let provider = Arc::new(MockProvider::always(answer));
    (WordEnricher::new(provider.clone()), provider)
}

#[tokio::test]
async fn test_text_upload_stops_at_heuristics() {
    let (enricher, provider) = llm(r#"{"words": []}"#);
    let pipeline = ExtractionPipeline::new().with_llm(enricher);
    let file = UploadedFile::new("unit4.txt", Some("text/plain"), LIST.as_bytes().to_vec());

    let report = pipeline.run(&file).await.unwrap();
    assert_eq!(report.kind, FileKind::Text);
    assert_eq!(report.strategy, Strategy::Heuristics);
    assert_eq!(
        outcomes(&report.attempts),
        vec![
            (Strategy::TextLayer, AttemptOutcome::Succeeded),
            (Strategy::Heuristics, AttemptOutcome::Succeeded),
        ]
    );
    let words: Vec<_> = report.words.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(words, vec!["abate", "candid", "zeal"]);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_image_goes_through_ocr() {
    let pipeline = ExtractionPipeline::new().with_ocr(Arc::new(FixedOcr::new(LIST)));
    let file = UploadedFile::new("photo.png", None, PNG_HEADER.to_vec());

    let report = pipeline.run(&file).await.unwrap();
    assert_eq!(report.kind, FileKind::Image);
    assert_eq!(report.strategy, Strategy::Heuristics);
    assert_eq!(report.attempts[0].strategy, Strategy::Ocr);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::Succeeded);
    assert_eq!(report.words.len(), 3);
    assert!(report.text_preview.starts_with("Unit 4 Vocabulary"));
}

#[tokio::test]
async fn test_broken_pdf_falls_back_to_ocr() {
    let pipeline = ExtractionPipeline::new().with_ocr(Arc::new(FixedOcr::new(LIST)));
    let file = UploadedFile::new("scan.pdf", Some("application/pdf"), b"%PDF-1.4 garbage".to_vec());

    let report = pipeline.run(&file).await.unwrap();
    assert_eq!(report.kind, FileKind::Pdf);
    assert_eq!(
        outcomes(&report.attempts),
        vec![
            (Strategy::PdfText, AttemptOutcome::Failed),
            (Strategy::Ocr, AttemptOutcome::Succeeded),
            (Strategy::Heuristics, AttemptOutcome::Succeeded),
        ]
    );
}

#[tokio::test]
async fn test_sparse_text_uses_llm_and_keeps_printed_definitions() {
    let text = "Reading passage\n\
The storm began to abate after midnight and a candid reporter praised the zeal of the crews.\n\
abate - to lessen";
    let (enricher, provider) = llm(
        r#"Here you go: {"words": [{"word": "abate"}, {"word": "candid", "definition": "honest"}, "zeal", "Abate"]}"#,
    );
    let pipeline = ExtractionPipeline::new().with_llm(enricher);
    let file = UploadedFile::new("passage.txt", None, text.as_bytes().to_vec());

    let report = pipeline.run(&file).await.unwrap();
    assert_eq!(report.strategy, Strategy::LlmInference);
    assert_eq!(
        outcomes(&report.attempts),
        vec![
            (Strategy::TextLayer, AttemptOutcome::Succeeded),
            (Strategy::Heuristics, AttemptOutcome::Insufficient),
            (Strategy::LlmInference, AttemptOutcome::Succeeded),
        ]
    );
    assert_eq!(report.words.len(), 3);
    assert_eq!(report.words[0].definition.as_deref(), Some("to lessen"));
    assert_eq!(report.words[0].line, 3);
    assert_eq!(report.line_of(&report.words[0]), Some("abate - to lessen"));
    assert_eq!(report.line_of(&report.words[2]), None);
    assert_eq!(report.words[1].definition.as_deref(), Some("honest"));
    assert_eq!(report.words[2].definition, None);
    assert!(provider.requests()[0].user_prompt().contains("abate - to lessen"));
}

#[tokio::test]
async fn test_failed_llm_returns_partial_heuristics() {
    let pipeline = ExtractionPipeline::new()
        .with_llm(WordEnricher::new(Arc::new(MockProvider::failing())));
    let file = UploadedFile::new("short.txt", None, b"abate - to lessen".to_vec());

    let report = pipeline.run(&file).await.unwrap();
    assert_eq!(report.strategy, Strategy::Heuristics);
    assert_eq!(report.words.len(), 1);
    let last = report.attempts.last().unwrap();
    assert_eq!(last.strategy, Strategy::LlmInference);
    assert_eq!(last.outcome, AttemptOutcome::Failed);
}

#[tokio::test]
async fn test_image_without_engines_is_exhausted() {
    let file = UploadedFile::new("photo.png", None, PNG_HEADER.to_vec());
    let err = ExtractionPipeline::new().run(&file).await.unwrap_err();

    let attempts = match err {
        ExtractionError::Exhausted { attempts } => attempts,
        other => panic!("expected exhaustion, got {other:?}"),
    };
    assert_eq!(
        outcomes(&attempts),
        vec![
            (Strategy::Ocr, AttemptOutcome::Skipped),
            (Strategy::Heuristics, AttemptOutcome::Skipped),
            (Strategy::LlmInference, AttemptOutcome::Skipped),
        ]
    );
}

#[tokio::test]
async fn test_unknown_binary_is_rejected() {
    let file = UploadedFile::new("blob.bin", None, vec![0u8, 0xC3, 0x28, 0xFF]);
    let err = ExtractionPipeline::new().run(&file).await.unwrap_err();
    assert!(matches!(err, ExtractionError::UnsupportedFile(name) if name == "blob.bin"));
}

#[tokio::test]
async fn test_report_serializes_camel_case() {
    let file = UploadedFile::new("unit4.txt", None, LIST.as_bytes().to_vec());
    let report = ExtractionPipeline::new().run(&file).await.unwrap();
    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(v["strategy"], "heuristics");
    assert_eq!(v["kind"], "text");
    assert!(v["textChars"].as_u64().unwrap() > 40);
    assert_eq!(v["words"][0]["partOfSpeech"], "v");
}
