//! Regex heuristics for printed vocabulary lists.
//!
//! Recognized line shapes:
//! - `12. abate (v.) to lessen` / `12) abate` (numbered)
//! - `abate - to lessen`, `abate: to lessen`, `abate — to lessen`, `abate<TAB>to lessen`
//! - `abate` alone on a line
//!
//! Headers, page numbers, digit-only lines and labelled lines
//! (`Example: …`, `Synonyms: …`) are skipped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use wordvault_model::{normalize_term, MAX_WORD_CHARS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateWord {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    /// 1-based source line; 0 when the word did not come from a line.
    #[serde(default)]
    pub line: usize,
}

impl CandidateWord {
    pub fn new(word: &str, definition: Option<&str>) -> Self {
        Self {
            word: word.trim().to_string(),
            definition: definition
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            part_of_speech: None,
            line: 0,
        }
    }
}

const HEADWORD: &str = r"[A-Za-z][A-Za-z'’\-]*(?: [A-Za-z][A-Za-z'’\-]*){0,3}";
const POS: &str = r"\(\s*([a-z]{1,5})\.?\s*\)";

static NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d{1,4}\s*[.)]\s*").expect("static regex"));

static SEPARATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^({HEADWORD})\s*(?:{POS})?(?:\s+[-–—]\s+|\s*[–—]\s*|\s*:\s*|\t+\s*)(.+)$"
    ))
    .expect("static regex")
});

static POS_LED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({HEADWORD})\s*{POS}\s*(.*)$")).expect("static regex")
});

static LEADING_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z'’\-]*)\s*(.*)$").expect("static regex")
});

static BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z][A-Za-z'’\-]{1,40})\s*$").expect("static regex"));

static PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:page|p\.)?\s*[\divx]+\s*(?:/|of)?\s*\d*\s*$").expect("static regex")
});

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:day|unit|chapter|lesson|week|part|section|list|test|set)\s*\d+\b.*|(?:word\s*list|vocabulary(?:\s+list)?|vocab|words?|definitions?|meanings?|name|date|score|answers?|index|contents)\s*:?\s*)$",
    )
    .expect("static regex")
});

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:examples?|ex|e\.g|synonyms?|syn|antonyms?|ant|notes?|sentence|usage|origin|etymology)\b")
        .expect("static regex")
});

/// Function words that are never list headwords on their own.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "and", "or", "in", "on", "by", "for", "with", "as", "at", "is",
    "be", "it", "this", "that",
];

/// Extracts candidate words in order of first appearance.
///
/// Repeated headwords (by normalized term) keep their first position; a
/// later definition only fills a missing one.
pub fn parse_word_list(text: &str) -> Vec<CandidateWord> {
    let mut out: Vec<CandidateWord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (i, raw) in text.lines().enumerate() {
        let Some(mut candidate) = parse_line(raw) else {
            continue;
        };
        candidate.line = i + 1;

        let key = normalize_term(&candidate.word);
        match index.get(&key) {
            Some(&pos) => {
                if out[pos].definition.is_none() {
                    out[pos].definition = candidate.definition;
                }
                if out[pos].part_of_speech.is_none() {
                    out[pos].part_of_speech = candidate.part_of_speech;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

fn parse_line(raw: &str) -> Option<CandidateWord> {
    let line = raw.trim().trim_start_matches(['•', '*', '·', '▪']).trim();
    if line.is_empty() || !line.chars().any(char::is_alphabetic) {
        return None;
    }
    if PAGE_NUMBER.is_match(line) || HEADER.is_match(line) || LABEL.is_match(line) {
        return None;
    }

    if let Some(prefix) = NUMBER_PREFIX.find(line) {
        let rest = &line[prefix.end()..];
        return parse_entry(rest).or_else(|| {
            // Numbered lines may run the definition straight after the word.
            let c = LEADING_WORD.captures(rest)?;
            candidate(&c[1], None, c.get(2).map(|m| m.as_str()))
        });
    }
    parse_entry(line).or_else(|| {
        let c = BARE.captures(line)?;
        candidate(&c[1], None, None)
    })
}

fn parse_entry(line: &str) -> Option<CandidateWord> {
    if let Some(c) = SEPARATED.captures(line) {
        return candidate(&c[1], c.get(2).map(|m| m.as_str()), c.get(3).map(|m| m.as_str()));
    }
    let c = POS_LED.captures(line)?;
    candidate(&c[1], Some(&c[2]), Some(&c[3]))
}

fn candidate(word: &str, pos: Option<&str>, definition: Option<&str>) -> Option<CandidateWord> {
    let word = word.trim().trim_end_matches(['-', '\'', '’']);
    if word.chars().count() < 2 || word.chars().count() > MAX_WORD_CHARS {
        return None;
    }
    if STOPWORDS.contains(&word.to_ascii_lowercase().as_str()) {
        return None;
    }
    let mut c = CandidateWord::new(word, definition.map(clean_definition).as_deref());
    c.part_of_speech = pos.map(|p| p.trim().to_string());
    Some(c)
}

fn clean_definition(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(['-', '–', '—', ':'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
