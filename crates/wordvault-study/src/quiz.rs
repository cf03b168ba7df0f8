//! Multiple-choice quizzes.
//!
//! Quizzes are stateless: `grade_quiz` checks each submitted answer against
//! the stored word, not against the generated question.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use wordvault_model::{normalize_term, UnifiedWord};

use crate::typing::normalize_answer;
use crate::{StudyError, QUIZ_CHOICES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    /// Show the word, pick its definition.
    #[default]
    WordToDefinition,
    /// Show a definition, pick the word.
    DefinitionToWord,
    /// Show the word, pick a synonym.
    Synonym,
}

impl QuizKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "word_to_definition" | "definition" => Some(Self::WordToDefinition),
            "definition_to_word" | "word" => Some(Self::DefinitionToWord),
            "synonym" | "synonyms" => Some(Self::Synonym),
            _ => None,
        }
    }

    fn eligible(&self, word: &UnifiedWord) -> bool {
        match self {
            QuizKind::WordToDefinition | QuizKind::DefinitionToWord => {
                word.primary_definition().is_some()
            }
            QuizKind::Synonym => word.synonyms.iter().any(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOptions {
    pub count: usize,
    pub kind: QuizKind,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub word_id: String,
    pub kind: QuizKind,
    pub prompt: String,
    pub choices: Vec<String>,
    pub answer_index: usize,
}

/// One submitted answer: the chosen text for a question about `word_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub word_id: String,
    pub kind: QuizKind,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub word_id: String,
    pub correct: bool,
    pub expected: String,
    pub given: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub total: usize,
    pub correct: usize,
    pub score_percent: f64,
    pub results: Vec<QuestionResult>,
}

pub fn generate_quiz(
    words: &[UnifiedWord],
    options: &QuizOptions,
) -> Result<Vec<QuizQuestion>, StudyError> {
    let eligible: Vec<&UnifiedWord> = words.iter().filter(|w| options.kind.eligible(w)).collect();
    if eligible.len() < QUIZ_CHOICES {
        return Err(StudyError::NotEnoughWords {
            needed: QUIZ_CHOICES,
            available: eligible.len(),
        });
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut targets = eligible.clone();
    targets.shuffle(&mut rng);
    let count = options.count.clamp(1, targets.len());

    let mut questions = Vec::with_capacity(count);
    for target in targets {
        if questions.len() == count {
            break;
        }
        if let Some(q) = build_question(target, &eligible, options.kind, &mut rng) {
            questions.push(q);
        }
    }

    if questions.is_empty() {
        return Err(StudyError::NotEnoughWords {
            needed: QUIZ_CHOICES,
            available: eligible.len(),
        });
    }
    debug!(kind = ?options.kind, questions = questions.len(), "quiz generated");
    Ok(questions)
}

/// `None` when fewer than three distinct distractors exist for `target`.
fn build_question(
    target: &UnifiedWord,
    pool: &[&UnifiedWord],
    kind: QuizKind,
    rng: &mut StdRng,
) -> Option<QuizQuestion> {
    let (prompt, answer) = match kind {
        QuizKind::WordToDefinition => (target.word.clone(), target.primary_definition()?.to_string()),
        QuizKind::DefinitionToWord => (target.primary_definition()?.to_string(), target.word.clone()),
        QuizKind::Synonym => {
            let syns: Vec<&String> = target.synonyms.iter().filter(|s| !s.trim().is_empty()).collect();
            (target.word.clone(), (*syns.choose(rng)?).clone())
        }
    };

    // Texts that must not appear as distractors.
    let mut taken: HashSet<String> = HashSet::from([normalize_answer(&answer)]);
    if kind == QuizKind::Synonym {
        taken.insert(normalize_answer(&target.word));
        taken.extend(target.synonyms.iter().map(|s| normalize_answer(s)));
    }

    let mut others: Vec<&&UnifiedWord> = pool.iter().filter(|w| w.id != target.id).collect();
    others.shuffle(rng);

    let mut distractors = Vec::with_capacity(QUIZ_CHOICES - 1);
    for other in others {
        if distractors.len() == QUIZ_CHOICES - 1 {
            break;
        }
        let candidate = match kind {
            QuizKind::WordToDefinition => other.primary_definition().map(str::to_string),
            QuizKind::DefinitionToWord => Some(other.word.clone()),
            // Other words' synonyms, falling back to the headword itself.
            QuizKind::Synonym => other
                .synonyms
                .iter()
                .find(|s| !taken.contains(&normalize_answer(s)))
                .cloned()
                .or_else(|| Some(other.word.clone())),
        };
        let Some(candidate) = candidate else { continue };
        if taken.insert(normalize_answer(&candidate)) {
            distractors.push(candidate);
        }
    }
    if distractors.len() < QUIZ_CHOICES - 1 {
        return None;
    }

    let answer_index = rng.gen_range(0..QUIZ_CHOICES);
    let mut choices = distractors;
    choices.insert(answer_index, answer);

    Some(QuizQuestion {
        word_id: target.id.clone(),
        kind,
        prompt,
        choices,
        answer_index,
    })
}

/// Grades submitted answers against the words they refer to.
pub fn grade_quiz(answers: &[QuizAnswer], words: &[UnifiedWord]) -> Result<QuizResult, StudyError> {
    let by_id: HashMap<&str, &UnifiedWord> = words.iter().map(|w| (w.id.as_str(), w)).collect();

    let mut results = Vec::with_capacity(answers.len());
    for a in answers {
        let word = by_id
            .get(a.word_id.as_str())
            .ok_or_else(|| StudyError::UnknownWord(a.word_id.clone()))?;
        let given = normalize_answer(&a.answer);
        let (correct, expected) = match a.kind {
            QuizKind::WordToDefinition => {
                let ok = word.definitions.iter().any(|d| normalize_answer(&d.text) == given);
                (ok, word.primary_definition().unwrap_or_default().to_string())
            }
            QuizKind::DefinitionToWord => (
                normalize_term(&word.word) == normalize_term(&a.answer),
                word.word.clone(),
            ),
            QuizKind::Synonym => (
                word.synonyms.iter().any(|s| normalize_answer(s) == given),
                word.synonyms.join(", "),
            ),
        };
        results.push(QuestionResult {
            word_id: a.word_id.clone(),
            correct: correct && !given.is_empty(),
            expected,
            given: a.answer.clone(),
        });
    }

    let total = results.len();
    let correct = results.iter().filter(|r| r.correct).count();
    let score_percent = if total == 0 {
        0.0
    } else {
        (correct as f64 * 1000.0 / total as f64).round() / 10.0
    };
    Ok(QuizResult {
        total,
        correct,
        score_percent,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordvault_model::WordSource;

    fn word(id: &str, term: &str, def: &str, syns: &[&str]) -> UnifiedWord {
        let mut w = UnifiedWord::new(id, term, WordSource::Official).with_definition(def);
        w.synonyms = syns.iter().map(|s| s.to_string()).collect();
        w
    }

    fn sample() -> Vec<UnifiedWord> {
        vec![
            word("w1", "abate", "to lessen in intensity", &["subside", "wane"]),
            word("w2", "candid", "truthful and straightforward", &["frank"]),
            word("w3", "zeal", "great energy or enthusiasm", &["fervor"]),
            word("w4", "laconic", "using very few words", &["terse"]),
            word("w5", "obdurate", "stubbornly refusing to change", &[]),
        ]
    }

    #[test]
    fn test_questions_have_four_distinct_choices() {
        let words = sample();
        let opts = QuizOptions {
            count: 10,
            kind: QuizKind::WordToDefinition,
            seed: Some(42),
        };
        let quiz = generate_quiz(&words, &opts).unwrap();
        assert_eq!(quiz.len(), 5);
        for q in &quiz {
            assert_eq!(q.choices.len(), QUIZ_CHOICES);
            let distinct: HashSet<_> = q.choices.iter().collect();
            assert_eq!(distinct.len(), QUIZ_CHOICES);
            let w = words.iter().find(|w| w.id == q.word_id).unwrap();
            assert_eq!(q.prompt, w.word);
            assert_eq!(q.choices[q.answer_index], w.primary_definition().unwrap());
        }
        assert_eq!(quiz, generate_quiz(&words, &opts).unwrap());
    }

    #[test]
    fn test_synonym_quiz_needs_words_with_synonyms() {
        let mut words = sample();
        words[3].synonyms.clear();
        let opts = QuizOptions {
            count: 3,
            kind: QuizKind::Synonym,
            seed: Some(1),
        };
        assert!(matches!(
            generate_quiz(&words, &opts),
            Err(StudyError::NotEnoughWords { needed: 4, available: 3 })
        ));
    }

    #[test]
    fn test_synonym_distractors_exclude_target_synonyms() {
        let words = sample();
        let opts = QuizOptions {
            count: 4,
            kind: QuizKind::Synonym,
            seed: Some(9),
        };
        for q in generate_quiz(&words, &opts).unwrap() {
            let w = words.iter().find(|w| w.id == q.word_id).unwrap();
            for (i, choice) in q.choices.iter().enumerate() {
                assert_eq!(w.synonyms.contains(choice), i == q.answer_index);
            }
        }
    }

    #[test]
    fn test_grading_uses_stored_words() {
        let words = sample();
        let answers = vec![
            QuizAnswer {
                word_id: "w1".into(),
                kind: QuizKind::WordToDefinition,
                answer: "To lessen in intensity.".into(),
            },
            QuizAnswer {
                word_id: "w2".into(),
                kind: QuizKind::DefinitionToWord,
                answer: "zeal".into(),
            },
            QuizAnswer {
                word_id: "w3".into(),
                kind: QuizKind::Synonym,
                answer: "Fervor".into(),
            },
        ];
        let result = grade_quiz(&answers, &words).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.correct, 2);
        assert_eq!(result.score_percent, 66.7);
        assert!(!result.results[1].correct);
        assert_eq!(result.results[1].expected, "candid");

        let unknown = vec![QuizAnswer {
            word_id: "nope".into(),
            kind: QuizKind::Synonym,
            answer: "x".into(),
        }];
        assert!(matches!(grade_quiz(&unknown, &words), Err(StudyError::UnknownWord(_))));
    }
}
