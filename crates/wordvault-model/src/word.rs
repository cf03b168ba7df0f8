//! Unified word document (`words_v3`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document id of a word.
pub type WordId = String;

/// Longest headword accepted by `UnifiedWord::validate`.
pub const MAX_WORD_CHARS: usize = 64;

pub const DEFAULT_DIFFICULTY: u8 = 5;

// ============================================================================
// Word Types
// ============================================================================

/// Where a word entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WordSource {
    /// Curated SAT/TOEFL list.
    Official,
    PdfUpload,
    PhotoUpload,
    AiGenerated,
    #[default]
    Manual,
    /// Normalized from a pre-v3 document.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pronunciation {
    pub ipa: Option<String>,
    pub audio_url: Option<String>,
}

impl Pronunciation {
    pub fn is_empty(&self) -> bool {
        self.ipa.is_none() && self.audio_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    /// Learner-language gloss (Korean in the official lists).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl Definition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            part_of_speech: None,
            translation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    pub sentence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl Example {
    pub fn new(sentence: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            translation: None,
        }
    }
}

/// The canonical word document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedWord {
    #[serde(default)]
    pub id: WordId,
    pub word: String,
    /// Lookup key, see `normalize_term`.
    pub normalized: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<Pronunciation>,
    #[serde(default)]
    pub parts_of_speech: Vec<String>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etymology: Option<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub source: WordSource,
    #[serde(default)]
    pub collection_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_difficulty() -> u8 {
    DEFAULT_DIFFICULTY
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("word must not be empty")]
    EmptyWord,
    #[error("word `{0}` is longer than {MAX_WORD_CHARS} characters")]
    WordTooLong(String),
    #[error("word `{word}` contains unsupported character `{ch}`")]
    InvalidCharacter { word: String, ch: char },
    #[error("difficulty {0} is outside 1..=10")]
    DifficultyOutOfRange(u8),
    #[error("definition #{0} has empty text")]
    EmptyDefinition(usize),
}

impl UnifiedWord {
    /// Creates an entry with no content besides the headword.
    pub fn new(id: impl Into<WordId>, word: impl Into<String>, source: WordSource) -> Self {
        let word = word.into().trim().to_string();
        let now = Utc::now();
        Self {
            id: id.into(),
            normalized: normalize_term(&word),
            word,
            pronunciation: None,
            parts_of_speech: Vec::new(),
            definitions: Vec::new(),
            etymology: None,
            synonyms: Vec::new(),
            antonyms: Vec::new(),
            examples: Vec::new(),
            difficulty: DEFAULT_DIFFICULTY,
            source,
            collection_ids: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_definition(mut self, text: impl Into<String>) -> Self {
        self.definitions.push(Definition::new(text));
        self
    }

    /// Text of the first definition, if any.
    pub fn primary_definition(&self) -> Option<&str> {
        self.definitions
            .iter()
            .map(|d| d.text.as_str())
            .find(|t| !t.trim().is_empty())
    }

    pub fn in_collection(&self, collection_id: &str) -> bool {
        self.collection_ids.iter().any(|c| c == collection_id)
    }

    pub fn add_to_collection(&mut self, collection_id: &str) {
        if !self.in_collection(collection_id) {
            self.collection_ids.push(collection_id.to_string());
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Checks the invariants every stored word must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_headword()?;
        self.validate_content()
    }

    /// Headword rules: non-empty, bounded length, letters and phrase punctuation only.
    pub fn validate_headword(&self) -> Result<(), ValidationError> {
        let word = self.word.trim();
        if word.is_empty() {
            return Err(ValidationError::EmptyWord);
        }
        if word.chars().count() > MAX_WORD_CHARS {
            return Err(ValidationError::WordTooLong(word.to_string()));
        }
        if let Some(ch) = word
            .chars()
            .find(|c| !(c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '’' | '.')))
        {
            return Err(ValidationError::InvalidCharacter {
                word: word.to_string(),
                ch,
            });
        }
        Ok(())
    }

    /// Everything except the headword.
    pub fn validate_content(&self) -> Result<(), ValidationError> {
        if !(1..=10).contains(&self.difficulty) {
            return Err(ValidationError::DifficultyOutOfRange(self.difficulty));
        }
        if let Some(idx) = self
            .definitions
            .iter()
            .position(|d| d.text.trim().is_empty())
        {
            return Err(ValidationError::EmptyDefinition(idx));
        }
        Ok(())
    }
}

/// Lowercases, trims and collapses inner whitespace.
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
