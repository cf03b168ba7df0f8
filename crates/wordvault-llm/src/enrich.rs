//! Word enrichment on top of an `LlmProvider`.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wordvault_model::{
    is_truncated_definition, normalize_term, Definition, Example, Pronunciation, UnifiedWord,
};

use crate::{prompts, parse_json_answer, CompletionRequest, LlmError, LlmProvider};

pub const DEFAULT_TARGET_LANGUAGE: &str = "Korean";

/// Fields `enrich_word` can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichField {
    Definitions,
    Examples,
    Synonyms,
    Etymology,
    Pronunciation,
}

impl EnrichField {
    pub const ALL: [EnrichField; 5] = [
        EnrichField::Definitions,
        EnrichField::Examples,
        EnrichField::Synonyms,
        EnrichField::Etymology,
        EnrichField::Pronunciation,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "definitions" | "definition" => Some(Self::Definitions),
            "examples" | "example" => Some(Self::Examples),
            "synonyms" | "antonyms" => Some(Self::Synonyms),
            "etymology" => Some(Self::Etymology),
            "pronunciation" | "ipa" => Some(Self::Pronunciation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definitions => "definitions",
            Self::Examples => "examples",
            Self::Synonyms => "synonyms",
            Self::Etymology => "etymology",
            Self::Pronunciation => "pronunciation",
        }
    }

    /// True when the word has nothing usable for this field.
    pub fn is_missing(&self, word: &UnifiedWord) -> bool {
        match self {
            Self::Definitions => word.primary_definition().is_none(),
            Self::Examples => word.examples.is_empty(),
            Self::Synonyms => word.synonyms.is_empty(),
            Self::Etymology => word.etymology.as_deref().map_or(true, |e| e.trim().is_empty()),
            Self::Pronunciation => word
                .pronunciation
                .as_ref()
                .map_or(true, |p| p.ipa.is_none()),
        }
    }

    pub fn missing_in(word: &UnifiedWord) -> Vec<EnrichField> {
        Self::ALL.into_iter().filter(|f| f.is_missing(word)).collect()
    }
}

// ============================================================================
// Answer shapes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TextOr<T> {
    Text(String),
    Object(T),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DefinitionAnswer {
    #[serde(alias = "definition", alias = "meaning")]
    text: String,
    #[serde(alias = "pos")]
    part_of_speech: Option<String>,
    translation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ExampleAnswer {
    #[serde(alias = "example", alias = "text")]
    sentence: String,
    translation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailsAnswer {
    parts_of_speech: Vec<String>,
    definitions: Vec<TextOr<DefinitionAnswer>>,
    etymology: Option<String>,
    synonyms: Vec<String>,
    antonyms: Vec<String>,
    examples: Vec<TextOr<ExampleAnswer>>,
    difficulty: Option<serde_json::Value>,
    pronunciation: Option<String>,
}

/// Parsed `word_details` answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDetails {
    pub parts_of_speech: Vec<String>,
    pub definitions: Vec<Definition>,
    pub etymology: Option<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub examples: Vec<Example>,
    pub difficulty: Option<u8>,
    pub pronunciation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SynonymSet {
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
}

/// A headword proposed by the model from raw list text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferredWord {
    #[serde(alias = "term")]
    pub word: String,
    pub definition: Option<String>,
}

fn definition_from(answer: TextOr<DefinitionAnswer>) -> Option<Definition> {
    let d = match answer {
        TextOr::Text(text) => DefinitionAnswer {
            text,
            ..Default::default()
        },
        TextOr::Object(d) => d,
    };
    let text = d.text.trim();
    if text.is_empty() {
        return None;
    }
    Some(Definition {
        text: text.to_string(),
        part_of_speech: non_empty(d.part_of_speech),
        translation: non_empty(d.translation),
    })
}

fn example_from(answer: TextOr<ExampleAnswer>) -> Option<Example> {
    let e = match answer {
        TextOr::Text(sentence) => ExampleAnswer {
            sentence,
            translation: None,
        },
        TextOr::Object(e) => e,
    };
    let sentence = e.sentence.trim();
    if sentence.is_empty() {
        return None;
    }
    Some(Example {
        sentence: sentence.to_string(),
        translation: non_empty(e.translation),
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null")
}

fn clean_list(items: Vec<String>, exclude: &str) -> Vec<String> {
    let exclude = normalize_term(exclude);
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let key = normalize_term(s);
            key != exclude && seen.insert(key)
        })
        .collect()
}

// ============================================================================
// Enricher
// ============================================================================

#[derive(Clone)]
pub struct WordEnricher {
    provider: Arc<dyn LlmProvider>,
    target_language: String,
}

impl WordEnricher {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }

    pub fn with_target_language(mut self, language: &str) -> Self {
        self.target_language = language.to_string();
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    async fn ask<T: DeserializeOwned>(&self, system: &str, prompt: String) -> Result<T, LlmError> {
        let request = CompletionRequest::new(system, prompt)
            .json()
            .with_temperature(0.3);
        let response = self.provider.complete(request).await?;
        parse_json_answer(&response.content)
    }

    /// Full dictionary entry for `word`. An answer without definitions is a parse error.
    pub async fn details(&self, word: &str) -> Result<WordDetails, LlmError> {
        let answer: DetailsAnswer = self
            .ask(prompts::SYSTEM_LEXICOGRAPHER, prompts::word_details(word))
            .await?;

        let definitions: Vec<Definition> =
            answer.definitions.into_iter().filter_map(definition_from).collect();
        if definitions.is_empty() {
            return Err(LlmError::Parse(format!("no definitions returned for `{word}`")));
        }

        Ok(WordDetails {
            parts_of_speech: clean_list(answer.parts_of_speech, ""),
            definitions,
            etymology: non_empty(answer.etymology),
            synonyms: clean_list(answer.synonyms, word),
            antonyms: clean_list(answer.antonyms, word),
            examples: answer.examples.into_iter().filter_map(example_from).collect(),
            difficulty: answer
                .difficulty
                .and_then(|d| d.as_f64())
                .map(|d| d.round().clamp(1.0, 10.0) as u8),
            pronunciation: non_empty(answer.pronunciation),
        })
    }

    pub async fn examples(
        &self,
        word: &str,
        definition: Option<&str>,
        count: usize,
    ) -> Result<Vec<Example>, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            examples: Vec<TextOr<ExampleAnswer>>,
        }
        let answer: Answer = self
            .ask(
                prompts::SYSTEM_LEXICOGRAPHER,
                prompts::examples(word, definition, count),
            )
            .await?;
        let examples: Vec<Example> = answer
            .examples
            .into_iter()
            .filter_map(example_from)
            .take(count)
            .collect();
        if examples.is_empty() {
            return Err(LlmError::Parse(format!("no examples returned for `{word}`")));
        }
        Ok(examples)
    }

    pub async fn synonyms(&self, word: &str, definition: Option<&str>) -> Result<SynonymSet, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            synonyms: Vec<String>,
            #[serde(default)]
            antonyms: Vec<String>,
        }
        let answer: Answer = self
            .ask(
                prompts::SYSTEM_LEXICOGRAPHER,
                prompts::synonyms(word, definition),
            )
            .await?;
        Ok(SynonymSet {
            synonyms: clean_list(answer.synonyms, word),
            antonyms: clean_list(answer.antonyms, word),
        })
    }

    pub async fn etymology(&self, word: &str) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            etymology: String,
        }
        let answer: Answer = self
            .ask(prompts::SYSTEM_LEXICOGRAPHER, prompts::etymology(word))
            .await?;
        non_empty(Some(answer.etymology))
            .ok_or_else(|| LlmError::Parse(format!("empty etymology for `{word}`")))
    }

    /// Rewrites a cut-off definition. Answers that still look truncated are rejected.
    pub async fn repair_definition(&self, word: &str, truncated: &str) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            definition: String,
        }
        let answer: Answer = self
            .ask(
                prompts::SYSTEM_LEXICOGRAPHER,
                prompts::repair_definition(word, truncated),
            )
            .await?;
        let repaired = answer.definition.trim().to_string();
        if is_truncated_definition(&repaired) {
            return Err(LlmError::Parse(format!(
                "repaired definition for `{word}` is still truncated: {repaired:?}"
            )));
        }
        Ok(repaired)
    }

    /// Translates into `target_language`, or the enricher's default language.
    pub async fn translate(&self, text: &str, target_language: Option<&str>) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            translation: String,
        }
        let language = target_language.unwrap_or(&self.target_language);
        let answer: Answer = self
            .ask(prompts::SYSTEM_TRANSLATOR, prompts::translate(text, language))
            .await?;
        non_empty(Some(answer.translation))
            .ok_or_else(|| LlmError::Parse("empty translation".to_string()))
    }

    /// Headwords the model reads out of noisy list text, de-duplicated in order.
    pub async fn infer_word_list(&self, raw_text: &str) -> Result<Vec<InferredWord>, LlmError> {
        #[derive(Deserialize)]
        struct Answer {
            words: Vec<TextOr<InferredWord>>,
        }
        let answer: Answer = self
            .ask(prompts::SYSTEM_LIST_READER, prompts::infer_word_list(raw_text))
            .await?;

        let mut seen = HashSet::new();
        let words: Vec<InferredWord> = answer
            .words
            .into_iter()
            .map(|w| match w {
                TextOr::Text(word) => InferredWord {
                    word,
                    definition: None,
                },
                TextOr::Object(w) => w,
            })
            .filter_map(|w| {
                let word = w.word.trim().to_string();
                if word.is_empty() || !seen.insert(normalize_term(&word)) {
                    return None;
                }
                Some(InferredWord {
                    word,
                    definition: non_empty(w.definition),
                })
            })
            .collect();
        debug!(count = words.len(), "inferred word list");
        Ok(words)
    }

    /// Fills the requested fields of `word` from one `details` call.
    ///
    /// Returns the fields that changed. Examples fall back to a dedicated
    /// prompt when the entry came back without any.
    pub async fn enrich_word(
        &self,
        word: &mut UnifiedWord,
        fields: &[EnrichField],
    ) -> Result<Vec<EnrichField>, LlmError> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let details = self.details(&word.word).await?;
        // Fill a copy so a failed follow-up call leaves `word` untouched.
        let mut draft = word.clone();
        let mut changed = Vec::new();

        for field in fields {
            let applied = match field {
                EnrichField::Definitions => {
                    draft.definitions = details.definitions.clone();
                    if draft.parts_of_speech.is_empty() {
                        draft.parts_of_speech = details.parts_of_speech.clone();
                    }
                    true
                }
                EnrichField::Examples => {
                    draft.examples = if details.examples.is_empty() {
                        let definition = draft.primary_definition().map(str::to_string);
                        self.examples(&draft.word, definition.as_deref(), 2).await?
                    } else {
                        details.examples.clone()
                    };
                    true
                }
                EnrichField::Synonyms => {
                    if details.synonyms.is_empty() && details.antonyms.is_empty() {
                        false
                    } else {
                        draft.synonyms = details.synonyms.clone();
                        draft.antonyms = details.antonyms.clone();
                        true
                    }
                }
                EnrichField::Etymology => match &details.etymology {
                    Some(e) => {
                        draft.etymology = Some(e.clone());
                        true
                    }
                    None => false,
                },
                EnrichField::Pronunciation => match &details.pronunciation {
                    Some(ipa) => {
                        let p = draft.pronunciation.get_or_insert_with(Pronunciation::default);
                        p.ipa = Some(ipa.clone());
                        true
                    }
                    None => false,
                },
            };
            if applied && !changed.contains(field) {
                changed.push(*field);
            }
        }

        if !changed.is_empty() {
            draft.touch();
            *word = draft;
        }
        Ok(changed)
    }

    /// Enriches several words concurrently, at most `concurrency` at a time.
    ///
    /// Results come back in input order; one failure does not stop the others.
    pub async fn enrich_many(
        &self,
        words: Vec<UnifiedWord>,
        fields: &[EnrichField],
        concurrency: usize,
    ) -> Vec<(UnifiedWord, Result<Vec<EnrichField>, LlmError>)> {
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let total = words.len();

        for (idx, mut word) in words.into_iter().enumerate() {
            let enricher = self.clone();
            let fields = fields.to_vec();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => enricher.enrich_word(&mut word, &fields).await,
                    Err(e) => Err(LlmError::Api(format!("enrichment cancelled: {e}"))),
                };
                (idx, word, result)
            });
        }

        let mut out: Vec<(usize, UnifiedWord, Result<Vec<EnrichField>, LlmError>)> =
            Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(item) => out.push(item),
                Err(e) => warn!(error = %e, "enrichment task failed"),
            }
        }
        out.sort_by_key(|(idx, _, _)| *idx);

        let failed = out.iter().filter(|(_, _, r)| r.is_err()).count();
        info!(total, failed, "enriched words");
        out.into_iter().map(|(_, w, r)| (w, r)).collect()
    }
}
