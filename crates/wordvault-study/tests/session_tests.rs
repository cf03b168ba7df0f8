//! A study session across modes, the way the server drives them.

use chrono::{Duration, TimeZone, Utc};
use wordvault_model::{StudyStatus, UnifiedWord, UserWordProgress, WordSource};
use wordvault_study::{
    build_deck, check_typing, generate_quiz, grade_quiz, record_answer, summarize, DeckOptions,
    QuizAnswer, QuizKind, QuizOptions, TypingVerdict,
};

fn words() -> Vec<UnifiedWord> {
    [
        ("w1", "abate", "to lessen in intensity"),
        ("w2", "candid", "truthful and straightforward"),
        ("w3", "zeal", "great energy or enthusiasm"),
        ("w4", "laconic", "using very few words"),
    ]
    .into_iter()
    .map(|(id, w, d)| UnifiedWord::new(id, w, WordSource::Official).with_definition(d))
    .collect()
}

#[test]
fn test_typing_then_quiz_updates_progress_and_deck() {
    let words = words();
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut progress: Vec<UserWordProgress> = words
        .iter()
        .map(|w| UserWordProgress::new("u1", w.id.clone()))
        .collect();

    // Typing: one exact, one near miss.
    let verdict = check_typing("abate", "Abate");
    record_answer(&mut progress[0], verdict.is_correct(), t0);
    let verdict = check_typing("candid", "candd");
    assert!(matches!(verdict, TypingVerdict::Almost { .. }));
    record_answer(&mut progress[1], verdict.is_correct(), t0);

    // Quiz: answer every question with its own answer index.
    let quiz = generate_quiz(
        &words,
        &QuizOptions {
            count: 4,
            kind: QuizKind::DefinitionToWord,
            seed: Some(3),
        },
    )
    .unwrap();
    let answers: Vec<QuizAnswer> = quiz
        .iter()
        .map(|q| QuizAnswer {
            word_id: q.word_id.clone(),
            kind: q.kind,
            answer: q.choices[q.answer_index].clone(),
        })
        .collect();
    let graded = grade_quiz(&answers, &words).unwrap();
    assert_eq!(graded.correct, 4);
    assert_eq!(graded.score_percent, 100.0);

    for r in &graded.results {
        let p = progress.iter_mut().find(|p| p.word_id == r.word_id).unwrap();
        record_answer(p, r.correct, t0 + Duration::minutes(1));
    }

    assert_eq!(progress[0].streak, 2);
    assert_eq!(progress[1].status, StudyStatus::Learning);
    assert_eq!(progress[1].incorrect_count, 1);

    // The last answer on every word was correct: next review is a day out.
    let later = t0 + Duration::hours(2);
    let deck = build_deck(&words, &progress, &DeckOptions::default(), later);
    assert!(deck.iter().all(|c| !c.due));

    let next_day = t0 + Duration::days(1) + Duration::hours(1);
    let deck = build_deck(&words, &progress, &DeckOptions::default(), next_day);
    assert!(deck.iter().all(|c| c.due));

    let stats = summarize(&progress, words.len(), next_day);
    assert_eq!(stats.learning, 4);
    assert_eq!(stats.new, 0);
    assert_eq!(stats.due, 4);
    assert_eq!(stats.accuracy_percent, 83.3);
}
