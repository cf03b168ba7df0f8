//! WordVault HTTP API server.
//!
//! A small hyper 1 server in front of the document store, the LLM enricher
//! and the extraction pipeline. Every `/api/*` endpoint speaks JSON:
//!
//! ```text
//! success: { "success": true,  ...payload }
//! failure: { "success": false, "error": "<message>" }
//! ```
//!
//! Identity comes from `Authorization: Bearer <token>`. User endpoints resolve
//! the token through a `TokenVerifier`; admin endpoints compare it against the
//! configured admin token.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderName, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use wordvault_ingest_docs::{Attempt, ExtractionError, ExtractionPipeline};
use wordvault_llm::{DictionaryError, LlmError, PronunciationSource, WordEnricher};
use wordvault_model::ValidationError;
use wordvault_storage::{DocumentStore, StoreError};
use wordvault_study::StudyError;

use crate::api;
use crate::auth::{bearer_token, AuthError, TokenVerifier};
use crate::maintenance::MaintenanceError;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// State
// ============================================================================

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub enricher: Option<WordEnricher>,
    pub pipeline: ExtractionPipeline,
    pub dictionary: Arc<dyn PronunciationSource>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub admin_token: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// The enricher, or 503 when no LLM backend is configured.
    pub fn enricher(&self) -> Result<&WordEnricher, ApiError> {
        self.enricher
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable("LLM backend is not configured".to_string()))
    }

    /// Uid behind the request's bearer token.
    pub async fn require_user(&self, req: &ApiRequest) -> Result<String, ApiError> {
        let token = bearer_token(req.authorization.as_deref()).ok_or(AuthError::MissingToken)?;
        let uid = self.verifier.verify(token).await?;
        debug!(uid = %uid, path = %req.path, "authenticated request");
        Ok(uid)
    }

    pub fn require_admin(&self, req: &ApiRequest) -> Result<(), ApiError> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(ApiError::Forbidden(
                "admin endpoints are disabled (no admin token configured)".to_string(),
            ));
        };
        let Some(token) = bearer_token(req.authorization.as_deref()) else {
            return Err(ApiError::Unauthorized(
                "missing Authorization: Bearer <token>".to_string(),
            ));
        };
        if token != expected {
            return Err(ApiError::Unauthorized("invalid admin token".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// A fully-read request, decoupled from hyper so handlers stay testable.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: HashMap::new(),
            authorization: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {token}"));
        self
    }

    pub fn with_json(mut self, value: &Value) -> Self {
        self.content_type = Some("application/json".to_string());
        self.body = Bytes::from(value.to_string());
        self
    }

    pub fn with_body(mut self, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self.body = body.into();
        self
    }

    /// Trimmed, non-empty query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required_param(&self, key: &str) -> Result<&str, ApiError> {
        self.param(key)
            .ok_or_else(|| ApiError::BadRequest(format!("missing query parameter `{key}`")))
    }

    pub fn bool_param(&self, key: &str) -> Result<Option<bool>, ApiError> {
        match self.param(key) {
            None => Ok(None),
            Some(v) => parse_bool(Some(v))
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest(format!("`{key}` must be a boolean, got `{v}`"))),
        }
    }

    pub fn usize_param(&self, key: &str) -> Result<Option<usize>, ApiError> {
        self.param(key)
            .map(|v| {
                v.parse::<usize>().map_err(|_| {
                    ApiError::BadRequest(format!("`{key}` must be a non-negative integer, got `{v}`"))
                })
            })
            .transpose()
    }

    pub fn u64_param(&self, key: &str) -> Result<Option<u64>, ApiError> {
        self.param(key)
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| ApiError::BadRequest(format!("`{key}` must be an integer, got `{v}`")))
            })
            .transpose()
    }

    /// Decodes the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::BadRequest("request body must be a JSON object".to_string()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
    }

    /// Decodes the JSON body, treating an empty body as `T::default()`.
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.json()
    }
}

pub fn parse_query_params(query: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(q) = query else {
        return out;
    };
    for (k, v) in form_urlencoded::parse(q.as_bytes()) {
        out.insert(k.into_owned(), v.into_owned());
    }
    out
}

pub fn parse_bool(v: Option<&str>) -> Option<bool> {
    let s = v?.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("request body exceeds {MAX_BODY_BYTES} bytes")]
    PayloadTooLarge,
    /// The upload was readable but no strategy found a word list.
    #[error("{message}")]
    Unprocessable {
        message: String,
        attempts: Vec<Attempt>,
    },
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({ "success": false, "error": self.to_string() });
        if let ApiError::Unprocessable { attempts, .. } = self {
            body["attempts"] = serde_json::to_value(attempts).unwrap_or(Value::Null);
        }
        body
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        json_response(status, &self.to_json())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::InvalidQuery(_) | StoreError::InvalidWord { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::NotConfigured(_) => ApiError::Unavailable(e.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<StudyError> for ApiError {
    fn from(e: StudyError) -> Self {
        match e {
            StudyError::NotEnoughWords { .. } => ApiError::BadRequest(e.to_string()),
            StudyError::UnknownWord(_) => ApiError::NotFound(e.to_string()),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedFile(_) => ApiError::BadRequest(e.to_string()),
            ExtractionError::Exhausted { ref attempts } => ApiError::Unprocessable {
                message: e.to_string(),
                attempts: attempts.clone(),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken => ApiError::Unauthorized(e.to_string()),
            AuthError::Verifier(_) => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<DictionaryError> for ApiError {
    fn from(e: DictionaryError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

impl From<MaintenanceError> for ApiError {
    fn from(e: MaintenanceError) -> Self {
        match e {
            MaintenanceError::Store(e) => e.into(),
            MaintenanceError::Llm(e) => e.into(),
            MaintenanceError::InvalidArgument(msg) => ApiError::BadRequest(msg),
        }
    }
}

pub type ApiResult = Result<Value, ApiError>;

/// Serializes a payload for a success body.
pub fn to_payload<T: Serialize>(value: &T) -> ApiResult {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(format!("serialize response: {e}")))
}

// ============================================================================
// Responses
// ============================================================================

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value)
        .unwrap_or_else(|_| b"{\"success\":false,\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::new(Full::new(Bytes::from_static(
                b"{\"success\":false,\"error\":\"internal\"}",
            )))
        })
}

/// `{ "success": true }` merged into an object payload; other payloads go under `data`.
pub fn success_body(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("success".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "success": true, "data": other }),
    }
}

fn respond(result: ApiResult) -> Response<Full<Bytes>> {
    match result {
        Ok(payload) => json_response(StatusCode::OK, &success_body(payload)),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Serve loop
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub ready_file: Option<PathBuf>,
}

pub async fn serve_async(config: ServerConfig, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {}: {e}", config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;

    info!(
        addr = %bound,
        store = state.store.backend_name(),
        llm = state.enricher.as_ref().map(|e| e.model_name()).unwrap_or("none"),
        ocr = state.pipeline.has_ocr(),
        auth = state.verifier.name(),
        "wordvault api listening"
    );
    if let Some(path) = config.ready_file.as_ref() {
        let payload = json!({
            "version": "wordvault_server_ready_v1",
            "addr": bound.to_string(),
            "pid": std::process::id(),
        });
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, serde_json::to_string_pretty(&payload).unwrap_or_default()) {
            warn!(path = %path.display(), error = %e, "failed to write ready file");
        }
    }

    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("serve: accept failed: {e}"))?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(peer = %peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if method == Method::GET && path == "/healthz" {
        return Ok(text_response(StatusCode::OK, "ok\n"));
    }

    let declared_len = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|n| n > MAX_BODY_BYTES) {
        return Ok(ApiError::PayloadTooLarge.into_response());
    }

    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header(AUTHORIZATION);
    let content_type = header(CONTENT_TYPE);
    let query = parse_query_params(req.uri().query());

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            return Ok(ApiError::PayloadTooLarge.into_response());
        }
        Err(e) => {
            return Ok(ApiError::BadRequest(format!("failed to read request body: {e}")).into_response());
        }
    };

    let api_req = ApiRequest {
        method,
        path,
        query,
        authorization,
        content_type,
        body,
    };
    debug!(method = %api_req.method, path = %api_req.path, bytes = api_req.body.len(), "request");
    Ok(respond(api::route(&state, &api_req).await))
}
