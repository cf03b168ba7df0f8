use serde::Deserialize;
use serde_json::json;
use tracing::info;
use wordvault_model::{normalize_term, Category, CollectionKind, UnifiedWord, VocabularyCollection, WordSource};
use wordvault_storage::generate_id;
use wordvault_storage::repo::{CollectionRepo, WordRepo};

use super::{own_personal_collection, word_or_404};
use crate::maintenance;
use crate::server::{ApiError, ApiRequest, ApiResult, AppState};

const MAX_NAME_CHARS: usize = 120;

fn parse_category(raw: Option<&str>) -> Result<Option<Category>, ApiError> {
    raw.map(|c| {
        Category::parse(c).ok_or_else(|| ApiError::BadRequest(format!("unknown category `{c}`")))
    })
    .transpose()
}

fn checked_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("`name` must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "`name` is longer than {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

// ============================================================================
// Official collections
// ============================================================================

pub(super) async fn list(state: &AppState, req: &ApiRequest) -> ApiResult {
    let category = parse_category(req.param("category"))?;
    let collections = CollectionRepo::new(state.store()).list(category).await?;
    Ok(json!({ "count": collections.len(), "collections": collections }))
}

#[derive(Debug, Deserialize)]
struct CreateCollectionRequest {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
}

pub(super) async fn create(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.require_admin(req)?;
    let body: CreateCollectionRequest = req.json()?;
    let category = parse_category(body.category.as_deref())?.unwrap_or_default();
    let repo = CollectionRepo::new(state.store());

    let id = body.id.as_deref().map(str::trim).unwrap_or_default();
    if !id.is_empty() && repo.get(id).await?.is_some() {
        return Err(ApiError::BadRequest(format!("collection `{id}` already exists")));
    }
    let mut collection = VocabularyCollection::official(id, checked_name(&body.name)?, category);
    collection.description = body.description.trim().to_string();
    repo.save(&mut collection).await?;

    info!(id = %collection.id, category = category.as_str(), "official collection created");
    Ok(json!({ "collection": collection }))
}

/// Official collections are public; personal ones need their owner's token.
pub(super) async fn get(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let collection = CollectionRepo::new(state.store())
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("collection `{id}` not found")))?;
    if collection.kind != CollectionKind::Official {
        let user = state.require_user(req).await?;
        if !collection.is_visible_to(Some(&user)) {
            return Err(ApiError::NotFound(format!("collection `{id}` not found")));
        }
    }
    Ok(json!({ "collection": collection }))
}

pub(super) async fn words(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let collection = CollectionRepo::new(state.store())
        .get(id)
        .await?
        .filter(|c| c.kind == CollectionKind::Official)
        .ok_or_else(|| ApiError::NotFound(format!("collection `{id}` not found")))?;
    let limit = req.usize_param("limit")?;
    let words = WordRepo::new(state.store())
        .list_by_collection(&collection.id, limit)
        .await?;
    Ok(json!({ "collection": collection, "count": words.len(), "words": words }))
}

/// Deletes an official or personal collection with its memberships.
pub(super) async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    state.require_admin(req)?;
    let report = maintenance::delete_collection(state.store(), id).await?;
    Ok(json!({ "deleted": id, "report": report }))
}

// ============================================================================
// Personal collections
// ============================================================================

pub(super) async fn list_personal(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let collections = CollectionRepo::new(state.store()).list_personal(&user).await?;
    Ok(json!({ "count": collections.len(), "collections": collections }))
}

#[derive(Debug, Deserialize)]
struct CreatePersonalRequest {
    name: String,
    #[serde(default)]
    description: String,
}

pub(super) async fn create_personal(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: CreatePersonalRequest = req.json()?;
    let mut collection = VocabularyCollection::personal("", checked_name(&body.name)?, user.as_str());
    collection.description = body.description.trim().to_string();
    CollectionRepo::new(state.store()).save(&mut collection).await?;
    info!(id = %collection.id, user = %user, "personal collection created");
    Ok(json!({ "collection": collection }))
}

pub(super) async fn delete_personal(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = state.require_user(req).await?;
    let collection = own_personal_collection(state, &user, id).await?;
    let removed = CollectionRepo::new(state.store())
        .delete_personal(&collection.id)
        .await?;
    info!(id, user = %user, removed, "personal collection deleted");
    Ok(json!({ "deleted": id, "documentsRemoved": removed }))
}

pub(super) async fn personal_words(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = state.require_user(req).await?;
    let collection = own_personal_collection(state, &user, id).await?;
    let ids = CollectionRepo::new(state.store())
        .personal_word_ids(&collection.id)
        .await?;
    let words = WordRepo::new(state.store()).get_many(&ids).await?;
    Ok(json!({ "collection": collection, "count": words.len(), "words": words }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AddWordRequest {
    word_id: Option<String>,
    /// Headword to link, created as a manual word when unknown.
    word: Option<String>,
    definition: Option<String>,
}

pub(super) async fn add_personal_word(state: &AppState, req: &ApiRequest, id: &str) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: AddWordRequest = req.json()?;
    let collection = own_personal_collection(state, &user, id).await?;
    let words = WordRepo::new(state.store());

    let word = match (body.word_id.as_deref(), body.word.as_deref()) {
        (Some(word_id), _) => word_or_404(state, word_id).await?,
        (None, Some(term)) if !normalize_term(term).is_empty() => match words.find_by_term(term).await? {
            Some(existing) => existing,
            None => {
                let mut word = UnifiedWord::new(generate_id(), term, WordSource::Manual);
                if let Some(def) = body.definition.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                    word = word.with_definition(def);
                }
                word.validate()?;
                words.create(word).await?
            }
        },
        _ => {
            return Err(ApiError::BadRequest(
                "provide `wordId` or a non-empty `word`".to_string(),
            ))
        }
    };

    let link = CollectionRepo::new(state.store())
        .add_personal_word(&collection.id, &word.id, &user)
        .await?;
    Ok(json!({ "link": link, "word": word }))
}

pub(super) async fn remove_personal_word(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
    word_id: &str,
) -> ApiResult {
    let user = state.require_user(req).await?;
    let collection = own_personal_collection(state, &user, id).await?;
    CollectionRepo::new(state.store())
        .remove_personal_word(&collection.id, word_id)
        .await?;
    Ok(json!({ "removed": word_id, "collectionId": collection.id }))
}
