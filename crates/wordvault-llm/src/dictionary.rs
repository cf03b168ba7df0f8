//! Pronunciation lookup via the Free Dictionary API (`api.dictionaryapi.dev`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use wordvault_model::{normalize_term, Pronunciation};

const DEFAULT_DICTIONARY_BASE_URL: &str = "https://api.dictionaryapi.dev";

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("dictionary request failed: {0}")]
    Network(String),
    #[error("dictionary http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("dictionary returned invalid JSON: {0}")]
    Parse(String),
}

#[async_trait]
pub trait PronunciationSource: Send + Sync {
    /// `Ok(None)` when the word is unknown to the source.
    async fn lookup(&self, word: &str) -> Result<Option<Pronunciation>, DictionaryError>;
}

pub struct FreeDictionaryClient {
    client: Client,
    base_url: String,
}

impl FreeDictionaryClient {
    pub fn new() -> Result<Self, DictionaryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DictionaryError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: DEFAULT_DICTIONARY_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn entry_url(&self, word: &str) -> Result<String, DictionaryError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DictionaryError::Network(format!("bad dictionary base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DictionaryError::Network("dictionary base url cannot have paths".to_string()))?
            .pop_if_empty()
            .extend(["api", "v2", "entries", "en", word]);
        Ok(url.to_string())
    }
}

#[async_trait]
impl PronunciationSource for FreeDictionaryClient {
    async fn lookup(&self, word: &str) -> Result<Option<Pronunciation>, DictionaryError> {
        let word = normalize_term(word);
        if word.is_empty() {
            return Ok(None);
        }
        let url = self.entry_url(&word)?;
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DictionaryError::Network(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!(word = %word, "dictionary has no entry");
                Ok(None)
            }
            s if s.is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| DictionaryError::Parse(e.to_string()))?;
                Ok(parse_entries(&body))
            }
            s => Err(DictionaryError::Http {
                status: s.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Picks the first phonetic text and the first non-empty audio URL across entries.
pub fn parse_entries(body: &Value) -> Option<Pronunciation> {
    let entries = body.as_array()?;
    let mut ipa: Option<String> = None;
    let mut audio: Option<String> = None;

    for entry in entries {
        if ipa.is_none() {
            ipa = entry
                .get("phonetic")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
        let phonetics = entry
            .get("phonetics")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for p in phonetics {
            if ipa.is_none() {
                ipa = p
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
            }
            if audio.is_none() {
                audio = p
                    .get("audio")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        if s.starts_with("//") {
                            format!("https:{s}")
                        } else {
                            s.to_string()
                        }
                    });
            }
        }
        if ipa.is_some() && audio.is_some() {
            break;
        }
    }

    let pronunciation = Pronunciation {
        ipa,
        audio_url: audio,
    };
    (!pronunciation.is_empty()).then_some(pronunciation)
}

/// Fixed word → pronunciation table for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticDictionary {
    entries: HashMap<String, Pronunciation>,
}

impl StaticDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, word: &str, ipa: &str, audio_url: Option<&str>) -> Self {
        self.entries.insert(
            normalize_term(word),
            Pronunciation {
                ipa: Some(ipa.to_string()),
                audio_url: audio_url.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl PronunciationSource for StaticDictionary {
    async fn lookup(&self, word: &str) -> Result<Option<Pronunciation>, DictionaryError> {
        Ok(self.entries.get(&normalize_term(word)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_entries_prefers_first_text_and_audio() {
        let body = json!([
            {
                "word": "abate",
                "phonetics": [
                    {"text": "/əˈbeɪt/", "audio": ""},
                    {"audio": "//ssl.gstatic.com/dictionary/abate.mp3"}
                ]
            },
            {"word": "abate", "phonetic": "/other/"}
        ]);
        let p = parse_entries(&body).unwrap();
        assert_eq!(p.ipa.as_deref(), Some("/əˈbeɪt/"));
        assert_eq!(
            p.audio_url.as_deref(),
            Some("https://ssl.gstatic.com/dictionary/abate.mp3")
        );
    }

    #[test]
    fn test_parse_entries_without_phonetics() {
        assert!(parse_entries(&json!([{"word": "zzz", "phonetics": []}])).is_none());
        assert!(parse_entries(&json!({"title": "No Definitions Found"})).is_none());
    }

    #[test]
    fn test_entry_url_escapes_word() {
        let client = FreeDictionaryClient::new()
            .unwrap()
            .with_base_url("http://127.0.0.1:9000/");
        assert_eq!(
            client.entry_url("laissez faire").unwrap(),
            "http://127.0.0.1:9000/api/v2/entries/en/laissez%20faire"
        );
    }

    #[tokio::test]
    async fn test_static_dictionary_normalizes_lookup() {
        let dict = StaticDictionary::new().with_entry("Abate", "/əˈbeɪt/", None);
        assert!(dict.lookup(" ABATE ").await.unwrap().is_some());
        assert!(dict.lookup("candid").await.unwrap().is_none());
    }
}
