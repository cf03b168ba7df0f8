//! Firestore REST backend.
//!
//! Uses the v1 REST surface only:
//! - `GET/PATCH/DELETE …/documents/{collection}/{id}`
//! - `POST …/documents/{collection}` (auto id)
//! - `POST …/documents:runQuery`
//! - `POST …/documents:commit`
//!
//! Authentication is a caller-provided OAuth access token. Against the
//! emulator (`FIRESTORE_EMULATOR_HOST`) no token is needed.

pub mod codec;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::query::{Direction, FilterOp};
use crate::{
    generate_id, Document, DocumentStore, Fields, Query, StoreError, StoreResult, WriteBatch,
    WriteOp,
};
use codec::{decode_document, encode_fields, encode_value};

pub const PROJECT_ID_ENV: &str = "FIREBASE_PROJECT_ID";
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";
pub const ACCESS_TOKEN_ENV: &str = "FIRESTORE_ACCESS_TOKEN";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl FirestoreConfig {
    pub fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            database: "(default)".to_string(),
            base_url: "https://firestore.googleapis.com".to_string(),
            access_token: None,
            timeout_secs: 30,
        }
    }

    /// Reads `FIREBASE_PROJECT_ID`, `FIRESTORE_EMULATOR_HOST`, `FIRESTORE_ACCESS_TOKEN`.
    pub fn from_env() -> StoreResult<Self> {
        let project_id = std::env::var(PROJECT_ID_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| StoreError::Backend(format!("{PROJECT_ID_ENV} is not set")))?;
        let mut config = Self::new(project_id.trim());

        if let Ok(host) = std::env::var(EMULATOR_HOST_ENV) {
            let host = host.trim();
            if !host.is_empty() {
                config.base_url = format!("http://{host}");
            }
        }
        config.access_token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(config)
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

// ============================================================================
// Store
// ============================================================================

pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn documents_url(&self) -> String {
        format!("{}/v1/{}", self.config.base_url, self.config.database_path())
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.documents_url())
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.config.database_path())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<(StatusCode, Value)> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Backend(format!("firestore request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Backend(format!("firestore response read failed: {e}")))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    fn backend_error(status: StatusCode, body: &Value) -> StoreError {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        StoreError::Backend(format!("firestore {status}: {message}"))
    }

    fn encode_write(&self, op: &WriteOp) -> Value {
        match op {
            WriteOp::Set {
                collection,
                id,
                fields,
            } => json!({
                "update": { "name": self.doc_name(collection, id), "fields": encode_fields(fields) }
            }),
            WriteOp::Merge {
                collection,
                id,
                fields,
            } => json!({
                "update": { "name": self.doc_name(collection, id), "fields": encode_fields(fields) },
                "updateMask": { "fieldPaths": fields.keys().map(|k| field_path(k)).collect::<Vec<_>>() },
                "currentDocument": { "exists": true }
            }),
            WriteOp::Delete { collection, id } => json!({
                "delete": self.doc_name(collection, id)
            }),
        }
    }
}

/// Quotes field names that are not simple identifiers.
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn filter_op_name(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "EQUAL",
        FilterOp::NotEq => "NOT_EQUAL",
        FilterOp::Lt => "LESS_THAN",
        FilterOp::Le => "LESS_THAN_OR_EQUAL",
        FilterOp::Gt => "GREATER_THAN",
        FilterOp::Ge => "GREATER_THAN_OR_EQUAL",
        FilterOp::ArrayContains => "ARRAY_CONTAINS",
        FilterOp::In => "IN",
    }
}

/// Builds the `structuredQuery` body for `runQuery`.
pub fn structured_query(query: &Query) -> Value {
    let mut sq = json!({ "from": [{ "collectionId": query.collection }] });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": field_path(&f.field) },
                    "op": filter_op_name(f.op),
                    "value": encode_value(&f.value),
                }
            })
        })
        .collect();
    match filters.len() {
        0 => {}
        1 => sq["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => sq["where"] = json!({ "compositeFilter": { "op": "AND", "filters": filters } }),
    }

    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        sq["orderBy"] = json!([{ "field": { "fieldPath": field_path(&order.field) }, "direction": direction }]);
    }
    if let Some(limit) = query.limit {
        sq["limit"] = json!(limit);
    }
    json!({ "structuredQuery": sq })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let url = self.doc_url(collection, id);
        let (status, body) = self.send(self.request(Method::GET, &url)).await?;
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => decode_document(&body).map(Some),
            s => Err(Self::backend_error(s, &body)),
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let url = self.doc_url(collection, id);
        let body = json!({ "fields": encode_fields(&fields) });
        let (status, body) = self
            .send(self.request(Method::PATCH, &url).json(&body))
            .await?;
        if !status.is_success() {
            return Err(Self::backend_error(status, &body));
        }
        debug!(collection, id, "firestore set");
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        let url = self.doc_url(collection, id);
        let mut params: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", field_path(k)))
            .collect();
        params.push(("currentDocument.exists", "true".to_string()));
        let body = json!({ "fields": encode_fields(&fields) });

        let (status, body) = self
            .send(self.request(Method::PATCH, &url).query(&params).json(&body))
            .await?;
        match status {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            s if s.is_success() => Ok(()),
            s => Err(Self::backend_error(s, &body)),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let url = self.doc_url(collection, id);
        let (status, body) = self.send(self.request(Method::DELETE, &url)).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(Self::backend_error(status, &body))
        }
    }

    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        // Generate the id client-side so retries cannot create duplicates.
        let id = generate_id();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.documents_url());
        let (status, body) = self
            .send(self.request(Method::POST, &url).json(&structured_query(query)))
            .await?;
        if !status.is_success() {
            return Err(Self::backend_error(status, &body));
        }

        let rows = body.as_array().cloned().unwrap_or_default();
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            // Rows without `document` only carry progress metadata.
            if let Some(resource) = row.get("document") {
                docs.push(decode_document(resource)?);
            }
        }
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let writes: Vec<Value> = batch.ops().iter().map(|op| self.encode_write(op)).collect();
        let url = format!("{}:commit", self.documents_url());
        let (status, body) = self
            .send(self.request(Method::POST, &url).json(&json!({ "writes": writes })))
            .await?;
        if !status.is_success() {
            warn!(%status, ops = batch.len(), "firestore commit rejected");
            return Err(Self::backend_error(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_query_combines_filters_with_and() {
        let q = Query::collection("words_v3")
            .where_eq("normalized", "abate")
            .filter("difficulty", FilterOp::Ge, 3)
            .order_by("normalized", Direction::Ascending)
            .limit(10);
        let body = structured_query(&q);
        let sq = &body["structuredQuery"];
        assert_eq!(sq["from"][0]["collectionId"], "words_v3");
        assert_eq!(sq["where"]["compositeFilter"]["op"], "AND");
        assert_eq!(
            sq["where"]["compositeFilter"]["filters"][1]["fieldFilter"]["op"],
            "GREATER_THAN_OR_EQUAL"
        );
        assert_eq!(sq["orderBy"][0]["direction"], "ASCENDING");
        assert_eq!(sq["limit"], 10);
    }

    #[test]
    fn single_filter_is_not_wrapped() {
        let q = Query::collection("user_words").where_eq("userId", "u1");
        let body = structured_query(&q);
        assert_eq!(
            body["structuredQuery"]["where"]["fieldFilter"]["value"],
            json!({"stringValue": "u1"})
        );
    }

    #[test]
    fn field_paths_are_quoted_when_needed() {
        assert_eq!(field_path("collectionIds"), "collectionIds");
        assert_eq!(field_path("my-field"), "`my-field`");
    }

    #[test]
    fn merge_writes_carry_mask_and_precondition() {
        let store = FirestoreStore::new(FirestoreConfig::new("demo")).unwrap();
        let mut fields = Fields::new();
        fields.insert("synonyms".into(), json!(["lessen"]));
        let write = store.encode_write(&WriteOp::merge("words_v3", "w1", fields));
        assert_eq!(
            write["update"]["name"],
            "projects/demo/databases/(default)/documents/words_v3/w1"
        );
        assert_eq!(write["updateMask"]["fieldPaths"][0], "synonyms");
        assert_eq!(write["currentDocument"]["exists"], true);
    }
}
