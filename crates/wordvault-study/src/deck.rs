//! Flashcard decks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use wordvault_model::{StudyStatus, UnifiedWord, UserWordProgress};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckOptions {
    pub limit: Option<usize>,
    pub status: Option<StudyStatus>,
    /// Shuffles within each group when set.
    pub shuffle_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub word: UnifiedWord,
    pub status: StudyStatus,
    pub due: bool,
    pub bookmarked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
}

/// Due cards first (most overdue leading), then unseen words, then the rest
/// by next review time.
pub fn build_deck(
    words: &[UnifiedWord],
    progress: &[UserWordProgress],
    options: &DeckOptions,
    now: DateTime<Utc>,
) -> Vec<Flashcard> {
    let by_word: HashMap<&str, &UserWordProgress> =
        progress.iter().map(|p| (p.word_id.as_str(), p)).collect();

    let mut due = Vec::new();
    let mut fresh = Vec::new();
    let mut rest = Vec::new();

    for word in words {
        let p = by_word.get(word.id.as_str()).copied();
        let card = Flashcard {
            word: word.clone(),
            status: p.map(|p| p.status).unwrap_or_default(),
            due: p.is_some_and(|p| p.is_due(now)),
            bookmarked: p.is_some_and(|p| p.bookmarked),
            next_review_at: p.and_then(|p| p.next_review_at),
        };
        if options.status.is_some_and(|s| s != card.status) {
            continue;
        }
        if card.due {
            due.push(card);
        } else if card.status == StudyStatus::New && card.next_review_at.is_none() {
            fresh.push(card);
        } else {
            rest.push(card);
        }
    }

    due.sort_by_key(|c| c.next_review_at);
    // None sorts last among scheduled cards.
    rest.sort_by_key(|c| (c.next_review_at.is_none(), c.next_review_at));

    if let Some(seed) = options.shuffle_seed {
        let mut rng = StdRng::seed_from_u64(seed);
        due.shuffle(&mut rng);
        fresh.shuffle(&mut rng);
        rest.shuffle(&mut rng);
    }

    let mut deck = due;
    deck.extend(fresh);
    deck.extend(rest);
    if let Some(limit) = options.limit {
        deck.truncate(limit);
    }
    deck
}
