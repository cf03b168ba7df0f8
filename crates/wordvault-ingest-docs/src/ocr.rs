//! OCR through Google Cloud Vision.
//!
//! Images go to `images:annotate` with `TEXT_DETECTION`; PDFs go to
//! `files:annotate` with `DOCUMENT_TEXT_DETECTION`, which only reads the
//! first `MAX_PDF_PAGES` pages per request.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::{FileKind, UploadedFile};

pub const GOOGLE_VISION_API_KEY_ENV: &str = "GOOGLE_VISION_API_KEY";
const DEFAULT_VISION_BASE_URL: &str = "https://vision.googleapis.com";
pub const MAX_PDF_PAGES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR not configured: {0}")]
    NotConfigured(String),
    #[error("OCR does not handle {0:?} files")]
    Unsupported(FileKind),
    #[error("OCR request failed: {0}")]
    Network(String),
    #[error("OCR API error: {0}")]
    Api(String),
    #[error("OCR returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Text read from the file; empty when nothing legible was found.
    async fn recognize(&self, file: &UploadedFile, kind: FileKind) -> Result<String, OcrError>;

    fn name(&self) -> &str;
}

pub struct VisionOcrClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl VisionOcrClient {
    pub fn new(api_key: &str) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| OcrError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_VISION_BASE_URL.to_string(),
        })
    }

    /// Reads `GOOGLE_VISION_API_KEY`.
    pub fn from_env() -> Result<Self, OcrError> {
        let key = std::env::var(GOOGLE_VISION_API_KEY_ENV).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(OcrError::NotConfigured(format!(
                "{GOOGLE_VISION_API_KEY_ENV} is not set"
            )));
        }
        Self::new(key)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn annotate(&self, endpoint: &str, body: Value) -> Result<Value, OcrError> {
        let url = format!("{}/v1/{endpoint}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(OcrError::Api(format!("vision http error {status}: {text}")));
        }
        resp.json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))
    }
}

/// Request body for `images:annotate`.
pub fn image_request(file: &UploadedFile) -> Value {
    json!({
        "requests": [{
            "image": { "content": STANDARD.encode(&file.bytes) },
            "features": [{ "type": "TEXT_DETECTION" }],
        }]
    })
}

/// Request body for `files:annotate` (first `MAX_PDF_PAGES` pages).
pub fn pdf_request(file: &UploadedFile) -> Value {
    let pages: Vec<usize> = (1..=MAX_PDF_PAGES).collect();
    json!({
        "requests": [{
            "inputConfig": { "content": STANDARD.encode(&file.bytes), "mimeType": "application/pdf" },
            "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }],
            "pages": pages,
        }]
    })
}

#[async_trait]
impl OcrEngine for VisionOcrClient {
    async fn recognize(&self, file: &UploadedFile, kind: FileKind) -> Result<String, OcrError> {
        let (endpoint, body) = match kind {
            FileKind::Image => ("images:annotate", image_request(file)),
            FileKind::Pdf => ("files:annotate", pdf_request(file)),
            FileKind::Text => return Err(OcrError::Unsupported(kind)),
        };
        let response = self.annotate(endpoint, body).await?;
        let text = parse_annotate_response(&response)?;
        debug!(filename = %file.filename, chars = text.len(), "vision OCR finished");
        Ok(text)
    }

    fn name(&self) -> &str {
        "google-vision"
    }
}

/// Collects recognized text from an `images:annotate` or `files:annotate` response.
///
/// A per-request `error` object is an `OcrError::Api` unless some other
/// request in the batch produced text.
pub fn parse_annotate_response(v: &Value) -> Result<String, OcrError> {
    let responses = v
        .get("responses")
        .and_then(Value::as_array)
        .ok_or_else(|| OcrError::InvalidResponse("missing `responses`".to_string()))?;

    let mut texts = Vec::new();
    let mut first_error: Option<String> = None;
    collect_text(responses, &mut texts, &mut first_error);

    if texts.is_empty() {
        if let Some(err) = first_error {
            return Err(OcrError::Api(err));
        }
    }
    Ok(texts.join("\n"))
}

fn collect_text(responses: &[Value], texts: &mut Vec<String>, first_error: &mut Option<String>) {
    for r in responses {
        // files:annotate nests one response per page.
        if let Some(nested) = r.get("responses").and_then(Value::as_array) {
            collect_text(nested, texts, first_error);
            continue;
        }
        if let Some(msg) = r.pointer("/error/message").and_then(Value::as_str) {
            first_error.get_or_insert_with(|| msg.to_string());
            continue;
        }
        let text = r
            .pointer("/fullTextAnnotation/text")
            .or_else(|| r.pointer("/textAnnotations/0/description"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("");
        if !text.is_empty() {
            texts.push(text.to_string());
        }
    }
}

/// Returns the same text for every file.
pub struct FixedOcr {
    text: String,
}

impl FixedOcr {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(&self, _file: &UploadedFile, kind: FileKind) -> Result<String, OcrError> {
        match kind {
            FileKind::Text => Err(OcrError::Unsupported(kind)),
            _ => Ok(self.text.clone()),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
