use serde::Deserialize;
use serde_json::json;

use crate::maintenance;
use crate::server::{ApiError, ApiRequest, ApiResult, AppState};

fn dry_run(req: &ApiRequest) -> Result<bool, ApiError> {
    Ok(req.bool_param("dry_run")?.unwrap_or(false))
}

/// `POST /api/admin/fix-definitions[?dry_run=true][&limit=N]`
pub(super) async fn fix_definitions(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.require_admin(req)?;
    let dry_run = dry_run(req)?;
    let report = maintenance::fix_definitions(
        state.store(),
        state.enricher.as_ref(),
        dry_run,
        req.usize_param("limit")?,
    )
    .await?;
    Ok(json!({ "report": report }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MigrateFieldRequest {
    collection: String,
    from: String,
    to: String,
    #[serde(default)]
    dry_run: Option<bool>,
}

pub(super) async fn migrate_field(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.require_admin(req)?;
    let body: MigrateFieldRequest = req.json()?;
    let dry_run = match body.dry_run {
        Some(d) => d,
        None => dry_run(req)?,
    };
    let report =
        maintenance::migrate_field(state.store(), &body.collection, &body.from, &body.to, dry_run)
            .await?;
    Ok(json!({ "report": report }))
}

pub(super) async fn normalize(state: &AppState, req: &ApiRequest) -> ApiResult {
    state.require_admin(req)?;
    let report = maintenance::normalize_words(state.store(), dry_run(req)?).await?;
    Ok(json!({ "report": report }))
}
