use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wordvault_model::{StudyStatus, UserWordProgress};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStats {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub reviewing: usize,
    pub mastered: usize,
    /// Correct answers over all answers, one decimal; 0 with no answers.
    pub accuracy_percent: f64,
    pub due: usize,
    pub bookmarked: usize,
}

/// Aggregates progress over a word set of `total_words` entries.
///
/// Words without a progress record count as new.
pub fn summarize(progress: &[UserWordProgress], total_words: usize, now: DateTime<Utc>) -> StudyStats {
    let mut stats = StudyStats {
        total: total_words,
        ..Default::default()
    };
    let (mut right, mut wrong) = (0u64, 0u64);

    for p in progress {
        match p.status {
            StudyStatus::New => {}
            StudyStatus::Learning => stats.learning += 1,
            StudyStatus::Reviewing => stats.reviewing += 1,
            StudyStatus::Mastered => stats.mastered += 1,
        }
        if p.is_due(now) {
            stats.due += 1;
        }
        if p.bookmarked {
            stats.bookmarked += 1;
        }
        right += u64::from(p.correct_count);
        wrong += u64::from(p.incorrect_count);
    }

    let seen = stats.learning + stats.reviewing + stats.mastered;
    stats.new = total_words.saturating_sub(seen);
    if right + wrong > 0 {
        stats.accuracy_percent = (right as f64 * 1000.0 / (right + wrong) as f64).round() / 10.0;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_counts_and_accuracy() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut a = UserWordProgress::new("u1", "w1");
        a.status = StudyStatus::Mastered;
        a.correct_count = 3;
        a.next_review_at = Some(now + Duration::days(3));
        let mut b = UserWordProgress::new("u1", "w2");
        b.status = StudyStatus::Learning;
        b.correct_count = 1;
        b.incorrect_count = 2;
        b.bookmarked = true;
        b.next_review_at = Some(now - Duration::minutes(5));
        let c = UserWordProgress::new("u1", "w3");

        let stats = summarize(&[a, b, c], 10, now);
        assert_eq!(stats.mastered, 1);
        assert_eq!(stats.learning, 1);
        assert_eq!(stats.new, 8);
        assert_eq!(stats.due, 1);
        assert_eq!(stats.bookmarked, 1);
        assert_eq!(stats.accuracy_percent, 66.7);
    }

    #[test]
    fn test_empty_progress() {
        let stats = summarize(&[], 0, Utc::now());
        assert_eq!(stats, StudyStats::default());
    }
}
