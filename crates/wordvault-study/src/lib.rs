//! Study modes for WordVault
//!
//! Everything here is pure: callers load words and progress from the store,
//! run one of the modes, and persist the updated progress.
//!
//! ```text
//!  answer ──record_answer──► UserWordProgress { streak, status, next_review_at }
//!
//!  New ──correct──► Learning ──3 in a row──► Mastered
//!                      ▲                        │
//!                      └──── Reviewing ◄─wrong──┘
//! ```

pub mod deck;
pub mod quiz;
pub mod schedule;
pub mod stats;
pub mod typing;

pub use deck::{build_deck, DeckOptions, Flashcard};
pub use quiz::{
    generate_quiz, grade_quiz, QuestionResult, QuizAnswer, QuizKind, QuizOptions, QuizQuestion,
    QuizResult,
};
pub use schedule::{record_answer, review_interval, MASTERY_STREAK};
pub use stats::{summarize, StudyStats};
pub use typing::{check_typing, levenshtein, normalize_answer, TypingPrompt, TypingVerdict};

/// Choices shown per quiz question.
pub const QUIZ_CHOICES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("need at least {needed} eligible words for this quiz, found {available}")]
    NotEnoughWords { needed: usize, available: usize },
    #[error("word not found: {0}")]
    UnknownWord(String),
}
