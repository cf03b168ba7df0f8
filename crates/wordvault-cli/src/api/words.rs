use std::collections::HashSet;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use wordvault_llm::EnrichField;
use wordvault_model::{normalize_term, Definition, Example, UnifiedWord, WordSource};
use wordvault_storage::generate_id;
use wordvault_storage::repo::{CollectionRepo, WordRepo};

use super::{own_personal_collection, word_or_404};
use crate::server::{ApiError, ApiRequest, ApiResult, AppState};

const DEFAULT_SEARCH_LIMIT: usize = 50;
const MAX_SEARCH_LIMIT: usize = 500;
const MAX_TRANSLATE_CHARS: usize = 5_000;

pub(super) async fn search(state: &AppState, req: &ApiRequest) -> ApiResult {
    let limit = req
        .usize_param("limit")?
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let prefix = req.param("q").unwrap_or_default();
    let repo = WordRepo::new(state.store());

    let words = match req.param("collection_id") {
        Some(collection_id) => {
            let key = normalize_term(prefix);
            let mut words = repo.list_by_collection(collection_id, None).await?;
            words.retain(|w| w.normalized.starts_with(&key));
            words.truncate(limit);
            words
        }
        None => repo.search_prefix(prefix, limit).await?,
    };
    Ok(json!({ "count": words.len(), "words": words }))
}

pub(super) async fn get(state: &AppState, id: &str) -> ApiResult {
    let word = word_or_404(state, id).await?;
    Ok(json!({ "word": word }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWordRequest {
    word: String,
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Vec<String>,
    #[serde(default)]
    examples: Vec<ExampleInput>,
    /// Personal collection to link the word into.
    #[serde(default)]
    collection_id: Option<String>,
    #[serde(default)]
    enrich: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExampleInput {
    Text(String),
    Full(Example),
}

impl ExampleInput {
    fn into_example(self) -> Option<Example> {
        let mut example = match self {
            ExampleInput::Text(s) => Example::new(s),
            ExampleInput::Full(e) => e,
        };
        example.sentence = example.sentence.trim().to_string();
        (!example.sentence.is_empty()).then_some(example)
    }
}

/// Creates a manual word. An existing entry with the same headword is reused.
pub(super) async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: CreateWordRequest = req.json()?;

    let collection = match body.collection_id.as_deref() {
        Some(id) => Some(own_personal_collection(state, &user, id).await?),
        None => None,
    };

    let repo = WordRepo::new(state.store());
    let (word, created, enriched) = match repo.find_by_term(&body.word).await? {
        Some(existing) => (existing, false, Vec::new()),
        None => {
            let mut word = UnifiedWord::new(generate_id(), body.word.trim(), WordSource::Manual);
            if let Some(text) = body.definition.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                word.definitions.push(Definition {
                    text: text.to_string(),
                    part_of_speech: body.part_of_speech.clone(),
                    translation: None,
                });
            }
            if let Some(pos) = body.part_of_speech.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                word.parts_of_speech.push(pos.to_string());
            }
            word.synonyms = clean_terms(body.synonyms, &word.word);
            word.antonyms = clean_terms(body.antonyms, &word.word);
            word.examples = body
                .examples
                .into_iter()
                .filter_map(ExampleInput::into_example)
                .collect();
            word.validate()?;

            let mut enriched = Vec::new();
            if body.enrich {
                let enricher = state.enricher()?;
                let missing = EnrichField::missing_in(&word);
                match enricher.enrich_word(&mut word, &missing).await {
                    Ok(fields) => enriched = fields,
                    Err(e) => warn!(word = %word.word, error = %e, "enrichment failed; saving as entered"),
                }
            }
            (repo.create(word).await?, true, enriched)
        }
    };

    if let Some(collection) = collection {
        CollectionRepo::new(state.store())
            .add_personal_word(&collection.id, &word.id, &user)
            .await?;
    }
    info!(word = %word.word, id = %word.id, created, user = %user, "word saved");
    Ok(json!({
        "word": word,
        "created": created,
        "enriched": enriched.iter().map(EnrichField::as_str).collect::<Vec<_>>(),
    }))
}

pub(super) async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    state.require_admin(req)?;
    WordRepo::new(state.store()).delete(id).await?;
    info!(id, "word deleted");
    Ok(json!({ "deleted": id }))
}

#[derive(Debug, Deserialize)]
struct SynonymsRequest {
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Option<Vec<String>>,
}

pub(super) async fn set_synonyms(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    state.require_user(req).await?;
    let body: SynonymsRequest = req.json()?;
    let mut word = word_or_404(state, id).await?;

    word.synonyms = clean_terms(body.synonyms, &word.word);
    if let Some(antonyms) = body.antonyms {
        word.antonyms = clean_terms(antonyms, &word.word);
    }
    word.touch();
    WordRepo::new(state.store()).update(&word).await?;
    Ok(json!({ "word": word }))
}

#[derive(Debug, Deserialize)]
struct ExamplesRequest {
    examples: Vec<ExampleInput>,
}

pub(super) async fn set_examples(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    state.require_user(req).await?;
    let body: ExamplesRequest = req.json()?;
    let mut word = word_or_404(state, id).await?;

    word.examples = body
        .examples
        .into_iter()
        .filter_map(ExampleInput::into_example)
        .collect();
    word.touch();
    WordRepo::new(state.store()).update(&word).await?;
    Ok(json!({ "word": word }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateRequest {
    /// Field names; empty means every field the word is missing.
    fields: Vec<String>,
    /// Regenerate the requested fields even when present.
    force: bool,
}

/// Fills word fields from the LLM, then pronunciation audio from the dictionary.
pub(super) async fn generate(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    state.require_user(req).await?;
    let body: GenerateRequest = req.json_or_default()?;
    let enricher = state.enricher()?;
    let mut word = word_or_404(state, id).await?;

    let requested = if body.fields.is_empty() {
        EnrichField::ALL.to_vec()
    } else {
        body.fields
            .iter()
            .map(|f| {
                EnrichField::parse(f)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown field `{f}`")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let fields: Vec<EnrichField> = if body.force {
        requested
    } else {
        requested.into_iter().filter(|f| f.is_missing(&word)).collect()
    };

    let mut updated = enricher.enrich_word(&mut word, &fields).await?;

    let wants_audio = fields.contains(&EnrichField::Pronunciation)
        && word.pronunciation.as_ref().map_or(true, |p| p.audio_url.is_none());
    if wants_audio {
        match state.dictionary.lookup(&word.word).await {
            Ok(Some(found)) => {
                let p = word.pronunciation.get_or_insert_with(Default::default);
                p.ipa = p.ipa.take().or(found.ipa);
                p.audio_url = found.audio_url;
                word.touch();
                if !updated.contains(&EnrichField::Pronunciation) {
                    updated.push(EnrichField::Pronunciation);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(word = %word.word, error = %e, "dictionary lookup failed"),
        }
    }

    if !updated.is_empty() {
        WordRepo::new(state.store()).update(&word).await?;
    }
    info!(id, updated = updated.len(), model = enricher.model_name(), "word generated");
    Ok(json!({
        "word": word,
        "updated": updated.iter().map(EnrichField::as_str).collect::<Vec<_>>(),
    }))
}

/// Cached pronunciation, or a dictionary lookup stored back on the word.
///
/// Cached reads are public; a lookup writes to the store and needs a user.
pub(super) async fn pronunciation(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let refresh = req.bool_param("refresh")?.unwrap_or(false);
    let mut word = word_or_404(state, id).await?;

    if let Some(p) = word.pronunciation.as_ref().filter(|p| !p.is_empty()) {
        if !refresh {
            return Ok(json!({ "pronunciation": p, "cached": true }));
        }
    }
    state.require_user(req).await?;

    let found = state
        .dictionary
        .lookup(&word.word)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no pronunciation found for `{}`", word.word)))?;
    word.pronunciation = Some(found.clone());
    word.touch();
    WordRepo::new(state.store()).update(&word).await?;
    Ok(json!({ "pronunciation": found, "cached": false }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    text: String,
    #[serde(default)]
    target_language: Option<String>,
}

pub(super) async fn translate(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.require_user(req).await?;
    let body: TranslateRequest = req.json()?;
    let text = body.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("`text` must not be empty".to_string()));
    }
    if text.chars().count() > MAX_TRANSLATE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "`text` is longer than {MAX_TRANSLATE_CHARS} characters"
        )));
    }
    let target = body
        .target_language
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let translation = state.enricher()?.translate(text, target).await?;
    Ok(json!({ "translation": translation, "targetLanguage": target }))
}

/// Trimmed, de-duplicated terms without the headword itself.
fn clean_terms(items: Vec<String>, headword: &str) -> Vec<String> {
    let headword = normalize_term(headword);
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| {
            let key = normalize_term(s);
            !key.is_empty() && key != headword && seen.insert(key)
        })
        .collect()
}
