//! Progress transitions and review spacing.

use chrono::{DateTime, Duration, Utc};
use wordvault_model::{StudyStatus, UserWordProgress};

/// Consecutive correct answers that make a word mastered.
pub const MASTERY_STREAK: u32 = 3;

const INTERVAL_DAYS: [i64; 6] = [1, 1, 3, 7, 14, 30];
const RETRY_MINUTES: i64 = 10;

/// Delay before the next review given the streak after an answer.
///
/// A streak of 0 is a miss and comes back after ten minutes.
pub fn review_interval(streak: u32) -> Duration {
    if streak == 0 {
        return Duration::minutes(RETRY_MINUTES);
    }
    let idx = (streak as usize - 1).min(INTERVAL_DAYS.len() - 1);
    Duration::days(INTERVAL_DAYS[idx])
}

/// Applies one answer to `progress`.
pub fn record_answer(progress: &mut UserWordProgress, correct: bool, now: DateTime<Utc>) {
    if correct {
        progress.streak += 1;
        progress.correct_count += 1;
        progress.status = if progress.streak >= MASTERY_STREAK {
            StudyStatus::Mastered
        } else {
            StudyStatus::Learning
        };
    } else {
        progress.streak = 0;
        progress.incorrect_count += 1;
        progress.status = if progress.status == StudyStatus::Mastered {
            StudyStatus::Reviewing
        } else {
            StudyStatus::Learning
        };
    }
    progress.study_count += 1;
    progress.last_studied_at = Some(now);
    progress.next_review_at = Some(now + review_interval(progress.streak));
}
