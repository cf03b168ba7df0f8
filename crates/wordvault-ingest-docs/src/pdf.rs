//! PDF text-layer extraction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfDocument {
    pub pages: Vec<PdfPage>,
    pub text: String,
}

impl PdfDocument {
    /// Characters that are not whitespace.
    pub fn text_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfPage {
    pub number: usize,
    pub text: String,
}

/// PDF parser using pdf-extract
#[derive(Debug, Clone, Default)]
pub struct PdfParser {
    max_pages: Option<usize>,
}

impl PdfParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the first `n` pages of text.
    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = Some(n);
        self
    }

    #[cfg(feature = "pdf")]
    pub fn parse_bytes(&self, data: &[u8]) -> Result<PdfDocument, PdfError> {
        use pdf_extract::extract_text_from_mem;

        // pdf-extract panics on some malformed files.
        let text = std::panic::catch_unwind(|| extract_text_from_mem(data))
            .map_err(|_| PdfError::ExtractionFailed("parser panicked on malformed PDF".to_string()))?
            .map_err(|e| PdfError::ExtractionFailed(e.to_string()))?;

        Ok(self.build(&text))
    }

    #[cfg(not(feature = "pdf"))]
    pub fn parse_bytes(&self, _data: &[u8]) -> Result<PdfDocument, PdfError> {
        Err(PdfError::FeatureNotEnabled)
    }

    fn build(&self, text: &str) -> PdfDocument {
        let mut pages = split_into_pages(text);
        if let Some(max) = self.max_pages {
            pages.truncate(max);
        }
        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        PdfDocument { pages, text }
    }
}

/// Splits on form feeds, which pdf-extract emits between pages.
fn split_into_pages(text: &str) -> Vec<PdfPage> {
    text.split('\x0C')
        .map(str::trim_end)
        .filter(|t| !t.trim().is_empty())
        .enumerate()
        .map(|(i, t)| PdfPage {
            number: i + 1,
            text: t.trim_start_matches('\n').to_string(),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("PDF feature not enabled. Compile with --features pdf")]
    FeatureNotEnabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_split_on_form_feed() {
        let doc = PdfParser::new().build("1. abate\n\x0C\n2. candid\n\x0C   \n\x0C3. zeal");
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[1].number, 2);
        assert_eq!(doc.pages[1].text, "2. candid");
    }

    #[test]
    fn test_max_pages_limits_text() {
        let doc = PdfParser::new()
            .with_max_pages(1)
            .build("first page\x0Csecond page");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.text, "first page");
        assert_eq!(doc.text_chars(), 9);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_garbage_bytes_fail_cleanly() {
        let err = PdfParser::new().parse_bytes(b"%PDF-1.4 not really a pdf").unwrap_err();
        assert!(matches!(err, PdfError::ExtractionFailed(_)));
    }
}
