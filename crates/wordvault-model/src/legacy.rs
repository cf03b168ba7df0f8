//! Legacy word documents → `UnifiedWord`.
//!
//! Word documents written before the v3 layout disagree on almost every field
//! name and on whether a field holds a string, an array, or an object. This
//! module reads whatever is present and fills a `UnifiedWord`; fields it does
//! not recognize are ignored.
//!
//! Recognized shapes:
//!
//! | v3 field | legacy spellings |
//! |---|---|
//! | `word` | `word`, `term`, `name` |
//! | `definitions` | `definitions[]` (string or `{text,definition,meaning}`), `definition`, `meaning` |
//! | translation | `translation`, `korean`, `koreanDefinition`, `koreanMeaning` |
//! | `partsOfSpeech` | `partsOfSpeech`, `partOfSpeech`, `part_of_speech`, `pos` |
//! | `examples` | `examples[]` (string or `{sentence,example,text}`), `example` |
//! | `synonyms`/`antonyms` | array or comma separated string |
//! | `etymology` | string or `{origin, description, summary}` |
//! | `pronunciation` | `pronunciation`, `phonetic`, `ipa` (string or object) |

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::word::{
    normalize_term, Definition, Example, Pronunciation, UnifiedWord, WordSource,
};

static LIST_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[,;/]\s*").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("document `{0}` is not a JSON object")]
    NotAnObject(String),
    #[error("document `{0}` has no recognizable word field")]
    MissingWord(String),
}

/// Maps a legacy (or already-v3) document onto `UnifiedWord`.
///
/// `default_source` is used when the document carries no `source` of its own.
pub fn normalize_legacy(
    id: &str,
    doc: &Value,
    default_source: WordSource,
) -> Result<UnifiedWord, NormalizeError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(id.to_string()))?;

    let word = first_string(obj, &["word", "term", "name"])
        .filter(|w| !w.trim().is_empty())
        .ok_or_else(|| NormalizeError::MissingWord(id.to_string()))?;

    let mut out = UnifiedWord::new(id, word, default_source);

    if let Some(source) = obj
        .get("source")
        .and_then(|v| serde_json::from_value::<WordSource>(v.clone()).ok())
    {
        out.source = source;
    }

    out.parts_of_speech = string_list(obj, &["partsOfSpeech", "partOfSpeech", "part_of_speech", "pos"]);
    out.definitions = definitions(obj);
    if let Some(pos) = out.parts_of_speech.first() {
        for d in out.definitions.iter_mut().filter(|d| d.part_of_speech.is_none()) {
            d.part_of_speech = Some(pos.clone());
        }
    }
    out.examples = examples(obj);
    out.synonyms = string_list(obj, &["synonyms"]);
    out.antonyms = string_list(obj, &["antonyms"]);
    out.etymology = etymology(obj);
    out.pronunciation = pronunciation(obj);
    out.collection_ids = string_list(obj, &["collectionIds", "collection_ids"]);
    if let Some(c) = first_string(obj, &["collectionId", "collection_id"]) {
        out.add_to_collection(&c);
    }
    out.tags = string_list(obj, &["tags"]);

    if let Some(d) = obj.get("difficulty").and_then(Value::as_f64) {
        out.difficulty = d.round().clamp(1.0, 10.0) as u8;
    }

    if let Some(ts) = obj.get("createdAt").or_else(|| obj.get("created_at")).and_then(timestamp) {
        out.created_at = ts;
    }
    out.updated_at = obj
        .get("updatedAt")
        .or_else(|| obj.get("updated_at"))
        .and_then(timestamp)
        .unwrap_or(out.created_at);

    // Re-derive in case the stored key was computed by older code.
    out.normalized = normalize_term(&out.word);
    Ok(out)
}

/// First non-blank string among `keys`.
fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let Some(value) = keys.iter().find_map(|k| obj.get(*k)) else {
        return Vec::new();
    };
    let raw: Vec<String> = match value {
        Value::String(s) => LIST_SPLIT.split(s).map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => first_string(o, &["word", "text", "value"]),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut out: Vec<String> = Vec::new();
    for item in raw {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(item)) {
            out.push(item.to_string());
        }
    }
    out
}

fn definitions(obj: &Map<String, Value>) -> Vec<Definition> {
    let doc_translation = first_string(
        obj,
        &["translation", "korean", "koreanDefinition", "koreanMeaning"],
    );

    let mut defs = Vec::new();
    if let Some(Value::Array(items)) = obj.get("definitions") {
        for item in items {
            match item {
                Value::String(s) if !s.trim().is_empty() => defs.push(Definition::new(s.trim())),
                Value::Object(o) => {
                    let Some(text) = first_string(o, &["text", "definition", "meaning"]) else {
                        continue;
                    };
                    defs.push(Definition {
                        text,
                        part_of_speech: first_string(o, &["partOfSpeech", "part_of_speech", "pos"]),
                        translation: first_string(o, &["translation", "korean"]),
                    });
                }
                _ => {}
            }
        }
    }

    if defs.is_empty() {
        if let Some(text) = first_string(obj, &["definition", "meaning", "englishDefinition"]) {
            defs.push(Definition::new(text));
        }
    }

    if let (Some(first), Some(tr)) = (defs.first_mut(), doc_translation) {
        if first.translation.is_none() {
            first.translation = Some(tr);
        }
    }
    defs
}

fn examples(obj: &Map<String, Value>) -> Vec<Example> {
    let mut out = Vec::new();
    if let Some(Value::Array(items)) = obj.get("examples") {
        for item in items {
            match item {
                Value::String(s) if !s.trim().is_empty() => out.push(Example::new(s.trim())),
                Value::Object(o) => {
                    if let Some(sentence) = first_string(o, &["sentence", "example", "text", "en"]) {
                        out.push(Example {
                            sentence,
                            translation: first_string(o, &["translation", "korean", "ko"]),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    if out.is_empty() {
        if let Some(s) = first_string(obj, &["example", "exampleSentence"]) {
            out.push(Example::new(s));
        }
    }
    out
}

fn etymology(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("etymology")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(o) => {
            let parts: Vec<String> = ["origin", "description", "summary"]
                .iter()
                .filter_map(|k| o.get(*k).and_then(Value::as_str))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

fn pronunciation(obj: &Map<String, Value>) -> Option<Pronunciation> {
    let value = ["pronunciation", "phonetic", "ipa"]
        .iter()
        .find_map(|k| obj.get(*k))?;
    let p = match value {
        Value::String(s) => Pronunciation {
            ipa: Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            audio_url: None,
        },
        Value::Object(o) => Pronunciation {
            ipa: first_string(o, &["ipa", "text", "phonetic"]),
            audio_url: first_string(o, &["audioUrl", "audio_url", "audio"]),
        },
        _ => return None,
    };
    (!p.is_empty()).then_some(p)
}

/// Accepts RFC 3339 strings, Firestore `{seconds, nanoseconds}` objects, and epoch millis.
fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Object(o) => {
            let secs = o
                .get("seconds")
                .or_else(|| o.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = match o.get("nanoseconds").or_else(|| o.get("_nanoseconds")) {
                Some(v) => u32::try_from(v.as_u64()?).ok()?,
                None => 0,
            };
            Utc.timestamp_opt(secs, nanos).single()
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
