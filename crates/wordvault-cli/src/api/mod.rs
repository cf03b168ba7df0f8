//! `/api/*` routing.
//!
//! Paths are split into segments and matched together with the method, so
//! `/api/words/{id}/synonyms` is `(POST, ["api", "words", id, "synonyms"])`.

mod admin;
mod collections;
mod extract;
mod study;
mod words;

use hyper::Method;
use serde_json::json;
use wordvault_model::{CollectionKind, UnifiedWord, VocabularyCollection};
use wordvault_storage::repo::{CollectionRepo, WordRepo};

use crate::server::{ApiError, ApiRequest, ApiResult, AppState};

pub async fn route(state: &AppState, req: &ApiRequest) -> ApiResult {
    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();

    match (req.method.clone(), segments.as_slice()) {
        (Method::GET, ["api", "status"]) => Ok(status(state)),

        (Method::GET, ["api", "words"]) => words::search(state, req).await,
        (Method::POST, ["api", "words"]) => words::create(state, req).await,
        (Method::GET, ["api", "words", id]) => words::get(state, id).await,
        (Method::DELETE, ["api", "words", id]) => words::delete(state, req, id).await,
        (Method::POST, ["api", "words", id, "synonyms"]) => words::set_synonyms(state, req, id).await,
        (Method::POST, ["api", "words", id, "examples"]) => words::set_examples(state, req, id).await,
        (Method::POST, ["api", "words", id, "generate"]) => words::generate(state, req, id).await,
        (Method::GET, ["api", "words", id, "pronunciation"]) => {
            words::pronunciation(state, req, id).await
        }
        (Method::POST, ["api", "translate"]) => words::translate(state, req).await,

        (Method::GET, ["api", "collections"]) => collections::list(state, req).await,
        (Method::POST, ["api", "collections"]) => collections::create(state, req).await,
        (Method::GET, ["api", "collections", id]) => collections::get(state, req, id).await,
        (Method::DELETE, ["api", "collections", id]) => collections::delete(state, req, id).await,
        (Method::GET, ["api", "collections", id, "words"]) => {
            collections::words(state, req, id).await
        }

        (Method::GET, ["api", "personal-collections"]) => {
            collections::list_personal(state, req).await
        }
        (Method::POST, ["api", "personal-collections"]) => {
            collections::create_personal(state, req).await
        }
        (Method::DELETE, ["api", "personal-collections", id]) => {
            collections::delete_personal(state, req, id).await
        }
        (Method::GET, ["api", "personal-collections", id, "words"]) => {
            collections::personal_words(state, req, id).await
        }
        (Method::POST, ["api", "personal-collections", id, "words"]) => {
            collections::add_personal_word(state, req, id).await
        }
        (Method::DELETE, ["api", "personal-collections", id, "words", word_id]) => {
            collections::remove_personal_word(state, req, id, word_id).await
        }

        (Method::POST, ["api", "extract"]) => extract::extract(state, req).await,
        (Method::GET, ["api", "photo-vocabulary"]) => extract::list_photo_words(state, req).await,
        (Method::POST, ["api", "photo-vocabulary"]) => extract::upload_photo(state, req).await,

        (Method::GET, ["api", "study", "flashcards"]) => study::flashcards(state, req).await,
        (Method::GET, ["api", "study", "typing"]) => study::typing_prompts(state, req).await,
        (Method::POST, ["api", "study", "typing", "check"]) => study::typing_check(state, req).await,
        (Method::GET, ["api", "study", "quiz"]) => study::quiz(state, req).await,
        (Method::POST, ["api", "study", "quiz", "submit"]) => study::quiz_submit(state, req).await,
        (Method::GET, ["api", "progress"]) => study::stats(state, req).await,
        (Method::POST, ["api", "progress"]) => study::record(state, req).await,
        (Method::POST, ["api", "progress", word_id, "bookmark"]) => {
            study::bookmark(state, req, word_id).await
        }

        (Method::POST, ["api", "admin", "fix-definitions"]) => admin::fix_definitions(state, req).await,
        (Method::POST, ["api", "admin", "migrate-field"]) => admin::migrate_field(state, req).await,
        (Method::POST, ["api", "admin", "normalize"]) => admin::normalize(state, req).await,

        _ => Err(ApiError::NotFound(format!(
            "no route for {} {}",
            req.method, req.path
        ))),
    }
}

fn status(state: &AppState) -> serde_json::Value {
    json!({
        "service": "wordvault",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.store.backend_name(),
        "llm": state.enricher.as_ref().map(|e| e.model_name().to_string()),
        "ocr": state.pipeline.has_ocr(),
        "auth": state.verifier.name(),
        "adminEnabled": state.admin_token.is_some(),
        "startedAt": state.started_at,
    })
}

// ============================================================================
// Shared lookups
// ============================================================================

async fn word_or_404(state: &AppState, id: &str) -> Result<UnifiedWord, ApiError> {
    WordRepo::new(state.store())
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("word `{id}` not found")))
}

/// A personal collection owned by `user_id`. Other users' collections are 404.
async fn own_personal_collection(
    state: &AppState,
    user_id: &str,
    id: &str,
) -> Result<VocabularyCollection, ApiError> {
    match CollectionRepo::new(state.store()).get(id).await? {
        Some(c) if c.kind == CollectionKind::Personal && c.owner_id.as_deref() == Some(user_id) => {
            Ok(c)
        }
        _ => Err(ApiError::NotFound(format!("personal collection `{id}` not found"))),
    }
}

/// Words of a collection the user may study: any official collection or one
/// of their own personal collections.
async fn collection_words(
    state: &AppState,
    user_id: &str,
    collection_id: &str,
) -> Result<Vec<UnifiedWord>, ApiError> {
    let repo = CollectionRepo::new(state.store());
    let collection = repo
        .get(collection_id)
        .await?
        .filter(|c| c.is_visible_to(Some(user_id)))
        .ok_or_else(|| ApiError::NotFound(format!("collection `{collection_id}` not found")))?;

    let words = WordRepo::new(state.store());
    match collection.kind {
        CollectionKind::Official => Ok(words.list_by_collection(collection_id, None).await?),
        CollectionKind::Personal | CollectionKind::Photo => {
            let ids = repo.personal_word_ids(collection_id).await?;
            Ok(words.get_many(&ids).await?)
        }
    }
}
