//! Per-user study progress (`user_words`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::word::WordId;

/// Firebase Auth uid.
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    #[default]
    New,
    Learning,
    /// Was mastered, then answered incorrectly.
    Reviewing,
    Mastered,
}

impl StudyStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "reviewing" => Some(Self::Reviewing),
            "mastered" => Some(Self::Mastered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWordProgress {
    pub user_id: UserId,
    pub word_id: WordId,
    #[serde(default)]
    pub status: StudyStatus,
    #[serde(default)]
    pub correct_count: u32,
    #[serde(default)]
    pub incorrect_count: u32,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub study_count: u32,
    #[serde(default)]
    pub bookmarked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_studied_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

impl UserWordProgress {
    pub fn new(user_id: impl Into<UserId>, word_id: impl Into<WordId>) -> Self {
        Self {
            user_id: user_id.into(),
            word_id: word_id.into(),
            status: StudyStatus::New,
            correct_count: 0,
            incorrect_count: 0,
            streak: 0,
            study_count: 0,
            bookmarked: false,
            last_studied_at: None,
            next_review_at: None,
        }
    }

    pub fn doc_id(&self) -> String {
        progress_doc_id(&self.user_id, &self.word_id)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.next_review_at, Some(at) if at <= now)
    }
}

/// Document id in `user_words`.
pub fn progress_doc_id(user_id: &str, word_id: &str) -> String {
    format!("{user_id}_{word_id}")
}
