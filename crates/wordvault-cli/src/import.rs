//! Storing extracted candidates as words.
//!
//! Shared by `wordvault import` and `POST /api/extract?save_to=…`.

use serde::Serialize;
use tracing::{info, warn};
use wordvault_ingest_docs::{CandidateWord, FileKind};
use wordvault_llm::{EnrichField, WordEnricher};
use wordvault_model::{normalize_term, Definition, UnifiedWord, WordSource};
use wordvault_storage::repo::WordRepo;
use wordvault_storage::{generate_id, DocumentStore, StoreResult};

/// Concurrent enrichment requests per import.
pub const ENRICH_CONCURRENCY: usize = 4;

/// Fields filled for words that already came with a definition.
const ENRICH_KEEP_DEFINITION: [EnrichField; 4] = [
    EnrichField::Examples,
    EnrichField::Synonyms,
    EnrichField::Etymology,
    EnrichField::Pronunciation,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: usize,
    pub existing: usize,
    /// Headwords rejected by validation.
    pub invalid: Vec<String>,
    pub enriched: usize,
    pub enrich_failed: usize,
    /// Ids of every stored or matched word, in candidate order.
    pub word_ids: Vec<String>,
}

pub fn source_for(kind: FileKind) -> WordSource {
    match kind {
        FileKind::Pdf => WordSource::PdfUpload,
        FileKind::Image => WordSource::PhotoUpload,
        FileKind::Text => WordSource::Manual,
    }
}

/// Saves candidates that are not yet known and links all of them into the
/// official collection `collection_id` when given.
///
/// New words are enriched first when an enricher is passed; enrichment
/// failures keep the word as extracted.
pub async fn store_candidates(
    store: &dyn DocumentStore,
    candidates: &[CandidateWord],
    source: WordSource,
    collection_id: Option<&str>,
    enricher: Option<&WordEnricher>,
) -> StoreResult<ImportSummary> {
    let repo = WordRepo::new(store);
    let mut summary = ImportSummary::default();
    let mut fresh: Vec<UnifiedWord> = Vec::new();
    let mut touched: Vec<UnifiedWord> = Vec::new();

    for candidate in candidates {
        let key = normalize_term(&candidate.word);
        if key.is_empty() {
            continue;
        }
        if let Some(id) = fresh.iter().find(|w| w.normalized == key).map(|w| w.id.clone()) {
            summary.word_ids.push(id);
            continue;
        }

        if let Some(mut existing) = repo.find_by_term(&candidate.word).await? {
            summary.existing += 1;
            summary.word_ids.push(existing.id.clone());
            if let Some(collection_id) = collection_id {
                if !existing.in_collection(collection_id) {
                    existing.add_to_collection(collection_id);
                    existing.touch();
                    touched.push(existing);
                }
            }
            continue;
        }

        let mut word = UnifiedWord::new(generate_id(), &candidate.word, source);
        if let Some(text) = candidate.definition.as_deref() {
            word.definitions.push(Definition {
                text: text.to_string(),
                part_of_speech: candidate.part_of_speech.clone(),
                translation: None,
            });
        }
        if let Some(pos) = candidate.part_of_speech.as_deref() {
            word.parts_of_speech.push(pos.to_string());
        }
        if let Some(collection_id) = collection_id {
            word.add_to_collection(collection_id);
        }
        if let Err(e) = word.validate() {
            warn!(word = %candidate.word, error = %e, "skipping invalid candidate");
            summary.invalid.push(candidate.word.clone());
            continue;
        }
        summary.word_ids.push(word.id.clone());
        fresh.push(word);
    }

    if let Some(enricher) = enricher {
        fresh = enrich_new_words(enricher, fresh, &mut summary).await;
    }

    summary.created = fresh.len();
    fresh.extend(touched);
    repo.save_all(&fresh).await?;

    info!(
        created = summary.created,
        existing = summary.existing,
        invalid = summary.invalid.len(),
        enriched = summary.enriched,
        collection = collection_id.unwrap_or("-"),
        "stored extracted words"
    );
    Ok(summary)
}

async fn enrich_new_words(
    enricher: &WordEnricher,
    words: Vec<UnifiedWord>,
    summary: &mut ImportSummary,
) -> Vec<UnifiedWord> {
    let (defined, undefined): (Vec<_>, Vec<_>) = words
        .into_iter()
        .partition(|w| w.primary_definition().is_some());

    let mut out = Vec::new();
    for (batch, fields) in [
        (defined, &ENRICH_KEEP_DEFINITION[..]),
        (undefined, &EnrichField::ALL[..]),
    ] {
        if batch.is_empty() {
            continue;
        }
        for (word, result) in enricher.enrich_many(batch, fields, ENRICH_CONCURRENCY).await {
            match result {
                Ok(_) => summary.enriched += 1,
                Err(e) => {
                    summary.enrich_failed += 1;
                    warn!(word = %word.word, error = %e, "enrichment failed");
                }
            }
            out.push(word);
        }
    }
    out
}
