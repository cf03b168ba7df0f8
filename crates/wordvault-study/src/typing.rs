//! Typing practice: the learner sees a definition and types the word.

use serde::{Deserialize, Serialize};
use wordvault_model::UnifiedWord;

/// Words shorter than this must be typed exactly.
const ALMOST_MIN_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TypingVerdict {
    Correct,
    /// One edit away. Counts as a miss for progress.
    Almost { distance: usize },
    Incorrect,
}

impl TypingVerdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, TypingVerdict::Correct)
    }
}

/// Trims, lowercases, collapses whitespace and drops trailing punctuation.
pub fn normalize_answer(s: &str) -> String {
    let collapsed = s
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '\'' && c != '-')
        .trim_end()
        .to_string()
}

pub fn check_typing(expected: &str, answer: &str) -> TypingVerdict {
    let expected = normalize_answer(expected);
    let answer = normalize_answer(answer);
    if answer.is_empty() {
        return TypingVerdict::Incorrect;
    }
    if expected == answer {
        return TypingVerdict::Correct;
    }
    let distance = levenshtein(&expected, &answer);
    if distance == 1 && expected.chars().count() >= ALMOST_MIN_CHARS {
        TypingVerdict::Almost { distance }
    } else {
        TypingVerdict::Incorrect
    }
}

/// Edit distance over chars, two-row table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// What the client shows for one typing question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPrompt {
    pub word_id: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    /// First letter followed by underscores, e.g. `a____`.
    pub hint: String,
    pub length: usize,
}

impl TypingPrompt {
    /// `None` for words without a definition.
    pub fn from_word(word: &UnifiedWord) -> Option<Self> {
        let def = word.definitions.iter().find(|d| !d.text.trim().is_empty())?;
        let mut chars = word.word.chars();
        let first = chars.next()?;
        let hint = std::iter::once(first)
            .chain(chars.map(|c| if c.is_alphabetic() { '_' } else { c }))
            .collect::<String>();
        Some(Self {
            word_id: word.id.clone(),
            definition: def.text.clone(),
            part_of_speech: def.part_of_speech.clone(),
            length: word.word.chars().count(),
            hint,
        })
    }
}
