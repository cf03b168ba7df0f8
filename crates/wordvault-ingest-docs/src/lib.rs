//! Word-list extraction for WordVault
//!
//! Uploaded files go through a fallback chain until one strategy yields a
//! usable word list:
//!
//! ```text
//!  UploadedFile ──classify──► Pdf | Image | Text
//!        │
//!        ▼
//!  text layer (UTF-8 / pdf-extract)
//!        │ missing or too short
//!        ▼
//!  OCR (Google Vision)
//!        │
//!        ▼
//!  list heuristics (regex) ──fewer than min_words──► LLM inference
//! ```
//!
//! Every step is recorded as an `Attempt` so callers can see why a file
//! ended up on a given strategy.

pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod wordlist;

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use ocr::{parse_annotate_response, FixedOcr, OcrEngine, OcrError, VisionOcrClient};
pub use pdf::{PdfDocument, PdfError, PdfPage, PdfParser};
pub use pipeline::{
    Attempt, AttemptOutcome, ExtractionError, ExtractionPipeline, ExtractionReport, Strategy,
};
pub use wordlist::{parse_word_list, CandidateWord};

// ============================================================================
// Uploads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Image,
    Text,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "csv", "tsv", "md"];

impl UploadedFile {
    pub fn new(filename: &str, content_type: Option<&str>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: content_type
                .map(|c| c.trim().to_ascii_lowercase())
                .filter(|c| !c.is_empty()),
            bytes: bytes.into(),
        }
    }

    /// Reads a local file; the content type is left to sniffing.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(&filename, None, bytes))
    }

    /// Magic bytes first, then the declared content type, then the extension.
    pub fn classify(&self) -> Result<FileKind, ExtractionError> {
        if let Some(kind) = sniff(&self.bytes) {
            return Ok(kind);
        }

        if let Some(ct) = self.content_type.as_deref() {
            let essence = ct.split(';').next().unwrap_or(ct).trim();
            if essence == "application/pdf" {
                return Ok(FileKind::Pdf);
            }
            if essence.starts_with("image/") {
                return Ok(FileKind::Image);
            }
            if essence.starts_with("text/") {
                return Ok(FileKind::Text);
            }
        }

        let ext = Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => return Ok(FileKind::Pdf),
            Some(e) if IMAGE_EXTENSIONS.contains(&e) => return Ok(FileKind::Image),
            Some(e) if TEXT_EXTENSIONS.contains(&e) => return Ok(FileKind::Text),
            _ => {}
        }

        if !self.bytes.contains(&0) && std::str::from_utf8(&self.bytes).is_ok() {
            return Ok(FileKind::Text);
        }
        Err(ExtractionError::UnsupportedFile(self.filename.clone()))
    }

    /// MIME type for image payloads sent to OCR.
    pub fn image_mime(&self) -> &'static str {
        let b = &self.bytes[..];
        if b.starts_with(b"\x89PNG") {
            "image/png"
        } else if b.starts_with(b"GIF8") {
            "image/gif"
        } else if b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WEBP" {
            "image/webp"
        } else {
            "image/jpeg"
        }
    }
}

fn sniff(bytes: &[u8]) -> Option<FileKind> {
    if bytes.starts_with(b"%PDF") {
        return Some(FileKind::Pdf);
    }
    let image = bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(&[0xFF, 0xD8, 0xFF])
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
        || (bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP");
    image.then_some(FileKind::Image)
}
