use chrono::Utc;
use serde_json::json;
use tracing::info;
use wordvault_ingest_docs::{ExtractionReport, UploadedFile};
use wordvault_model::{PhotoVocabularyWord, VocabularyCollection, WordSource};
use wordvault_storage::generate_id;
use wordvault_storage::repo::{CollectionRepo, PhotoRepo};

use super::own_personal_collection;
use crate::import::{source_for, store_candidates};
use crate::server::{ApiError, ApiRequest, AppState, ApiResult};

const DEFAULT_FILENAME: &str = "upload";

/// Reads the raw upload body into an `UploadedFile`.
fn uploaded_file(req: &ApiRequest) -> Result<UploadedFile, ApiError> {
    if req.body.is_empty() {
        return Err(ApiError::BadRequest("upload body is empty".to_string()));
    }
    let filename = req.param("filename").unwrap_or(DEFAULT_FILENAME);
    Ok(UploadedFile::new(
        filename,
        req.content_type.as_deref(),
        req.body.clone(),
    ))
}

async fn run_pipeline(state: &AppState, file: &UploadedFile) -> Result<ExtractionReport, ApiError> {
    let report = state.pipeline.run(file).await?;
    info!(
        filename = %file.filename,
        kind = ?report.kind,
        strategy = ?report.strategy,
        words = report.words.len(),
        "upload extracted"
    );
    Ok(report)
}

/// `POST /api/extract?filename=…[&save_to=<personal collection>][&enrich=true]`
pub(super) async fn extract(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let enrich = req.bool_param("enrich")?.unwrap_or(false);
    let save_to = match req.param("save_to") {
        Some(id) => Some(own_personal_collection(state, &user, id).await?),
        None => None,
    };
    let enricher = if enrich { Some(state.enricher()?) } else { None };
    let file = uploaded_file(req)?;

    let report = run_pipeline(state, &file).await?;

    let Some(collection) = save_to else {
        return Ok(json!({ "report": report }));
    };

    let summary = store_candidates(
        state.store(),
        &report.words,
        source_for(report.kind),
        None,
        enricher,
    )
    .await?;
    let repo = CollectionRepo::new(state.store());
    let mut linked = Vec::with_capacity(summary.word_ids.len());
    for word_id in &summary.word_ids {
        if !linked.contains(word_id) {
            repo.add_personal_word(&collection.id, word_id, &user).await?;
            linked.push(word_id.clone());
        }
    }
    Ok(json!({
        "report": report,
        "saved": summary,
        "collectionId": collection.id,
        "linked": linked.len(),
    }))
}

/// `GET /api/photo-vocabulary[?session_id=…]`
pub(super) async fn list_photo_words(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let words = PhotoRepo::new(state.store())
        .list_for_user(&user, req.param("session_id"))
        .await?;
    Ok(json!({ "count": words.len(), "words": words }))
}

/// `POST /api/photo-vocabulary?filename=…`: every extracted word is stored
/// for the user under a new session id together with its source line. The
/// session doubles as a photo collection the user can study.
pub(super) async fn upload_photo(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let file = uploaded_file(req)?;
    let report = run_pipeline(state, &file).await?;

    let session_id = generate_id();
    let now = Utc::now();
    let mut words: Vec<PhotoVocabularyWord> = report
        .words
        .iter()
        .map(|c| PhotoVocabularyWord {
            id: String::new(),
            user_id: user.clone(),
            session_id: session_id.clone(),
            word: c.word.clone(),
            definition: c.definition.clone(),
            source_text: report.line_of(c).unwrap_or_default().to_string(),
            created_at: now,
        })
        .collect();
    PhotoRepo::new(state.store()).save_all(&mut words).await?;

    let collections = CollectionRepo::new(state.store());
    let mut collection = VocabularyCollection::photo(
        session_id.as_str(),
        format!("Photo {}", now.format("%Y-%m-%d %H:%M")),
        user.as_str(),
    );
    collection.description = file.filename.clone();
    collections.save(&mut collection).await?;

    let summary = store_candidates(
        state.store(),
        &report.words,
        WordSource::PhotoUpload,
        None,
        None,
    )
    .await?;
    let mut linked: Vec<&String> = Vec::with_capacity(summary.word_ids.len());
    for word_id in &summary.word_ids {
        if !linked.contains(&word_id) {
            collections.add_personal_word(&collection.id, word_id, &user).await?;
            linked.push(word_id);
        }
    }

    info!(
        user = %user,
        session = %session_id,
        words = words.len(),
        linked = linked.len(),
        "photo vocabulary stored"
    );
    Ok(json!({
        "sessionId": session_id,
        "collectionId": collection.id,
        "count": words.len(),
        "words": words,
        "saved": summary,
        "report": report,
    }))
}
