//! Sequential extraction fallback chain.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wordvault_llm::WordEnricher;
use wordvault_model::normalize_term;

use crate::ocr::OcrEngine;
use crate::pdf::PdfParser;
use crate::wordlist::{parse_word_list, CandidateWord};
use crate::{FileKind, UploadedFile};

pub const DEFAULT_MIN_TEXT_CHARS: usize = 40;
pub const DEFAULT_MIN_WORDS: usize = 3;
const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    TextLayer,
    PdfText,
    Ocr,
    Heuristics,
    LlmInference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    /// Ran, but produced too little to stop the chain.
    Insufficient,
    Failed,
    /// Not configured or had no input.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: Strategy,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub kind: FileKind,
    /// Strategy that produced `words`.
    pub strategy: Strategy,
    pub attempts: Vec<Attempt>,
    pub text_chars: usize,
    pub words: Vec<CandidateWord>,
    pub text_preview: String,
    /// Full text the words were read from.
    #[serde(skip)]
    pub text: String,
}

impl ExtractionReport {
    /// Source line of a candidate, when it came from one.
    pub fn line_of(&self, word: &CandidateWord) -> Option<&str> {
        word.line
            .checked_sub(1)
            .and_then(|i| self.text.lines().nth(i))
            .map(str::trim)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("no extraction strategy produced words after {} attempts", attempts.len())]
    Exhausted { attempts: Vec<Attempt> },
}

/// Text layer, then OCR, then list heuristics, then LLM inference.
#[derive(Clone)]
pub struct ExtractionPipeline {
    pdf: PdfParser,
    ocr: Option<Arc<dyn OcrEngine>>,
    llm: Option<WordEnricher>,
    min_text_chars: usize,
    min_words: usize,
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self {
            pdf: PdfParser::new(),
            ocr: None,
            llm: None,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            min_words: DEFAULT_MIN_WORDS,
        }
    }

    pub fn with_pdf_parser(mut self, parser: PdfParser) -> Self {
        self.pdf = parser;
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_llm(mut self, llm: WordEnricher) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_min_text_chars(mut self, n: usize) -> Self {
        self.min_text_chars = n;
        self
    }

    pub fn with_min_words(mut self, n: usize) -> Self {
        self.min_words = n.max(1);
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn run(&self, file: &UploadedFile) -> Result<ExtractionReport, ExtractionError> {
        let kind = file.classify()?;
        let mut attempts = Vec::new();
        debug!(filename = %file.filename, ?kind, bytes = file.bytes.len(), "extraction started");

        // --- text layer --------------------------------------------------
        let mut text = match kind {
            FileKind::Text => {
                let text = String::from_utf8_lossy(&file.bytes).into_owned();
                let outcome = if visible_chars(&text) > 0 {
                    AttemptOutcome::Succeeded
                } else {
                    AttemptOutcome::Insufficient
                };
                attempts.push(attempt(Strategy::TextLayer, outcome, None));
                text
            }
            FileKind::Pdf => self.pdf_text(file, &mut attempts).await,
            FileKind::Image => String::new(),
        };

        // --- OCR -----------------------------------------------------------
        if kind != FileKind::Text && visible_chars(&text) < self.min_text_chars {
            if let Some(ocr_text) = self.ocr_text(file, kind, &mut attempts).await {
                if visible_chars(&ocr_text) > visible_chars(&text) {
                    text = ocr_text;
                }
            }
        }

        // --- heuristics ----------------------------------------------------
        let heuristic_words = if visible_chars(&text) == 0 {
            attempts.push(attempt(
                Strategy::Heuristics,
                AttemptOutcome::Skipped,
                Some("no text to parse".to_string()),
            ));
            Vec::new()
        } else {
            let words = parse_word_list(&text);
            if words.len() >= self.min_words {
                attempts.push(attempt(
                    Strategy::Heuristics,
                    AttemptOutcome::Succeeded,
                    Some(format!("{} words", words.len())),
                ));
                return Ok(self.finish(kind, Strategy::Heuristics, attempts, &text, words));
            }
            attempts.push(attempt(
                Strategy::Heuristics,
                AttemptOutcome::Insufficient,
                Some(format!("{} words, need {}", words.len(), self.min_words)),
            ));
            words
        };

        // --- LLM inference -------------------------------------------------
        if let Some(words) = self.llm_words(&text, &heuristic_words, &mut attempts).await {
            return Ok(self.finish(kind, Strategy::LlmInference, attempts, &text, words));
        }

        if !heuristic_words.is_empty() {
            warn!(
                filename = %file.filename,
                words = heuristic_words.len(),
                "falling back to partial heuristic word list"
            );
            return Ok(self.finish(kind, Strategy::Heuristics, attempts, &text, heuristic_words));
        }

        warn!(filename = %file.filename, attempts = attempts.len(), "extraction exhausted");
        Err(ExtractionError::Exhausted { attempts })
    }

    async fn pdf_text(&self, file: &UploadedFile, attempts: &mut Vec<Attempt>) -> String {
        let parser = self.pdf.clone();
        let bytes = file.bytes.clone();
        let parsed = tokio::task::spawn_blocking(move || parser.parse_bytes(&bytes)).await;

        match parsed {
            Ok(Ok(doc)) => {
                let chars = doc.text_chars();
                let outcome = if chars >= self.min_text_chars {
                    AttemptOutcome::Succeeded
                } else {
                    AttemptOutcome::Insufficient
                };
                attempts.push(attempt(
                    Strategy::PdfText,
                    outcome,
                    Some(format!("{} pages, {chars} chars", doc.pages.len())),
                ));
                doc.text
            }
            Ok(Err(e)) => {
                warn!(filename = %file.filename, error = %e, "PDF text extraction failed");
                attempts.push(attempt(Strategy::PdfText, AttemptOutcome::Failed, Some(e.to_string())));
                String::new()
            }
            Err(e) => {
                attempts.push(attempt(
                    Strategy::PdfText,
                    AttemptOutcome::Failed,
                    Some(format!("extraction task failed: {e}")),
                ));
                String::new()
            }
        }
    }

    async fn ocr_text(
        &self,
        file: &UploadedFile,
        kind: FileKind,
        attempts: &mut Vec<Attempt>,
    ) -> Option<String> {
        let Some(ocr) = &self.ocr else {
            attempts.push(attempt(
                Strategy::Ocr,
                AttemptOutcome::Skipped,
                Some("no OCR engine configured".to_string()),
            ));
            return None;
        };

        match ocr.recognize(file, kind).await {
            Ok(text) if visible_chars(&text) > 0 => {
                attempts.push(attempt(
                    Strategy::Ocr,
                    AttemptOutcome::Succeeded,
                    Some(format!("{} chars via {}", visible_chars(&text), ocr.name())),
                ));
                Some(text)
            }
            Ok(_) => {
                attempts.push(attempt(
                    Strategy::Ocr,
                    AttemptOutcome::Insufficient,
                    Some("no text recognized".to_string()),
                ));
                None
            }
            Err(e) => {
                warn!(filename = %file.filename, engine = ocr.name(), error = %e, "OCR failed");
                attempts.push(attempt(Strategy::Ocr, AttemptOutcome::Failed, Some(e.to_string())));
                None
            }
        }
    }

    async fn llm_words(
        &self,
        text: &str,
        heuristic_words: &[CandidateWord],
        attempts: &mut Vec<Attempt>,
    ) -> Option<Vec<CandidateWord>> {
        let Some(llm) = &self.llm else {
            attempts.push(attempt(
                Strategy::LlmInference,
                AttemptOutcome::Skipped,
                Some("no LLM provider configured".to_string()),
            ));
            return None;
        };
        if visible_chars(text) == 0 {
            attempts.push(attempt(
                Strategy::LlmInference,
                AttemptOutcome::Skipped,
                Some("no text to read".to_string()),
            ));
            return None;
        }

        match llm.infer_word_list(text).await {
            Ok(inferred) if !inferred.is_empty() => {
                let known: HashMap<String, &CandidateWord> = heuristic_words
                    .iter()
                    .map(|c| (normalize_term(&c.word), c))
                    .collect();
                let words: Vec<CandidateWord> = inferred
                    .into_iter()
                    .map(|w| {
                        let mut c = CandidateWord::new(&w.word, w.definition.as_deref());
                        // Heuristic matches carry the source line and any printed definition.
                        if let Some(seen) = known.get(&normalize_term(&c.word)) {
                            c.line = seen.line;
                            c.part_of_speech = seen.part_of_speech.clone();
                            if c.definition.is_none() {
                                c.definition = seen.definition.clone();
                            }
                        }
                        c
                    })
                    .collect();
                attempts.push(attempt(
                    Strategy::LlmInference,
                    AttemptOutcome::Succeeded,
                    Some(format!("{} words via {}", words.len(), llm.model_name())),
                ));
                Some(words)
            }
            Ok(_) => {
                attempts.push(attempt(
                    Strategy::LlmInference,
                    AttemptOutcome::Insufficient,
                    Some("model returned no words".to_string()),
                ));
                None
            }
            Err(e) => {
                warn!(error = %e, "LLM word inference failed");
                attempts.push(attempt(
                    Strategy::LlmInference,
                    AttemptOutcome::Failed,
                    Some(e.to_string()),
                ));
                None
            }
        }
    }

    fn finish(
        &self,
        kind: FileKind,
        strategy: Strategy,
        attempts: Vec<Attempt>,
        text: &str,
        words: Vec<CandidateWord>,
    ) -> ExtractionReport {
        info!(?kind, ?strategy, words = words.len(), "extraction finished");
        ExtractionReport {
            kind,
            strategy,
            attempts,
            text_chars: visible_chars(text),
            words,
            text_preview: text.trim().chars().take(PREVIEW_CHARS).collect(),
            text: text.to_string(),
        }
    }
}

fn attempt(strategy: Strategy, outcome: AttemptOutcome, detail: Option<String>) -> Attempt {
    Attempt {
        strategy,
        outcome,
        detail,
    }
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}
