use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use wordvault_model::{StudyStatus, UnifiedWord, UserWordProgress};
use wordvault_storage::repo::{ProgressRepo, WordRepo};
use wordvault_study::{
    build_deck, check_typing, generate_quiz, grade_quiz, record_answer, summarize, DeckOptions,
    QuizAnswer, QuizKind, QuizOptions, TypingPrompt,
};

use super::{collection_words, word_or_404};
use crate::server::{ApiError, ApiRequest, ApiResult, AppState};

const DEFAULT_TYPING_PROMPTS: usize = 20;
const DEFAULT_QUIZ_QUESTIONS: usize = 10;
const MAX_STUDY_ITEMS: usize = 200;

/// Words of `collection_id` plus the user's progress on them.
async fn study_set(
    state: &AppState,
    req: &ApiRequest,
    user: &str,
) -> Result<(Vec<UnifiedWord>, Vec<UserWordProgress>), ApiError> {
    let collection_id = req.required_param("collection_id")?;
    let words = collection_words(state, user, collection_id).await?;
    let ids: HashSet<&str> = words.iter().map(|w| w.id.as_str()).collect();
    let progress = ProgressRepo::new(state.store())
        .list_for_user(user)
        .await?
        .into_iter()
        .filter(|p| ids.contains(p.word_id.as_str()))
        .collect();
    Ok((words, progress))
}

fn limit_param(req: &ApiRequest, key: &str, default: usize) -> Result<usize, ApiError> {
    Ok(req.usize_param(key)?.unwrap_or(default).clamp(1, MAX_STUDY_ITEMS))
}

// ============================================================================
// Flashcards and typing
// ============================================================================

pub(super) async fn flashcards(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let status = req
        .param("status")
        .map(|s| {
            StudyStatus::parse(s).ok_or_else(|| ApiError::BadRequest(format!("unknown status `{s}`")))
        })
        .transpose()?;
    let options = DeckOptions {
        limit: req.usize_param("limit")?,
        status,
        shuffle_seed: req.u64_param("seed")?,
    };
    let (words, progress) = study_set(state, req, &user).await?;
    let cards = build_deck(&words, &progress, &options, Utc::now());
    Ok(json!({ "count": cards.len(), "cards": cards }))
}

pub(super) async fn typing_prompts(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let limit = limit_param(req, "limit", DEFAULT_TYPING_PROMPTS)?;
    let options = DeckOptions {
        limit: None,
        status: None,
        shuffle_seed: req.u64_param("seed")?,
    };
    let (words, progress) = study_set(state, req, &user).await?;
    let prompts: Vec<TypingPrompt> = build_deck(&words, &progress, &options, Utc::now())
        .iter()
        .filter_map(|card| TypingPrompt::from_word(&card.word))
        .take(limit)
        .collect();
    Ok(json!({ "count": prompts.len(), "prompts": prompts }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingCheckRequest {
    word_id: String,
    answer: String,
}

pub(super) async fn typing_check(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: TypingCheckRequest = req.json()?;
    let word = word_or_404(state, &body.word_id).await?;

    let verdict = check_typing(&word.word, &body.answer);
    let repo = ProgressRepo::new(state.store());
    let mut progress = repo.get_or_new(&user, &word.id).await?;
    record_answer(&mut progress, verdict.is_correct(), Utc::now());
    repo.save(&progress).await?;

    Ok(json!({
        "result": verdict,
        "correct": verdict.is_correct(),
        "expected": word.word,
        "progress": progress,
    }))
}

// ============================================================================
// Quiz
// ============================================================================

pub(super) async fn quiz(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let kind = match req.param("kind") {
        Some(k) => QuizKind::parse(k)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown quiz kind `{k}`")))?,
        None => QuizKind::default(),
    };
    let options = QuizOptions {
        count: limit_param(req, "count", DEFAULT_QUIZ_QUESTIONS)?,
        kind,
        seed: req.u64_param("seed")?,
    };
    let (words, _) = study_set(state, req, &user).await?;
    let questions = generate_quiz(&words, &options)?;
    Ok(json!({ "kind": kind, "count": questions.len(), "questions": questions }))
}

#[derive(Debug, Deserialize)]
struct QuizSubmitRequest {
    answers: Vec<QuizAnswer>,
}

/// Grades against stored words and records every answer as progress.
pub(super) async fn quiz_submit(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: QuizSubmitRequest = req.json()?;
    if body.answers.is_empty() {
        return Err(ApiError::BadRequest("`answers` must not be empty".to_string()));
    }
    if body.answers.len() > MAX_STUDY_ITEMS {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_STUDY_ITEMS} answers per submission"
        )));
    }

    let mut ids: Vec<String> = body.answers.iter().map(|a| a.word_id.clone()).collect();
    ids.sort();
    ids.dedup();
    let words = WordRepo::new(state.store()).get_many(&ids).await?;
    let result = grade_quiz(&body.answers, &words)?;

    let repo = ProgressRepo::new(state.store());
    let now = Utc::now();
    let mut updated: Vec<UserWordProgress> = Vec::new();
    for r in &result.results {
        let idx = match updated.iter().position(|p| p.word_id == r.word_id) {
            Some(idx) => idx,
            None => {
                updated.push(repo.get_or_new(&user, &r.word_id).await?);
                updated.len() - 1
            }
        };
        record_answer(&mut updated[idx], r.correct, now);
    }
    repo.save_all(&updated).await?;
    debug!(user = %user, total = result.total, correct = result.correct, "quiz graded");

    Ok(json!({ "result": result, "progress": updated }))
}

// ============================================================================
// Progress
// ============================================================================

/// Stats over one collection, or over every word the user has studied.
pub(super) async fn stats(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let now = Utc::now();
    let stats = if req.param("collection_id").is_some() {
        let (words, progress) = study_set(state, req, &user).await?;
        summarize(&progress, words.len(), now)
    } else {
        let progress = ProgressRepo::new(state.store()).list_for_user(&user).await?;
        summarize(&progress, progress.len(), now)
    };
    Ok(json!({ "stats": stats }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequest {
    word_id: String,
    correct: bool,
}

pub(super) async fn record(state: &AppState, req: &ApiRequest) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: RecordRequest = req.json()?;
    let word = word_or_404(state, &body.word_id).await?;

    let repo = ProgressRepo::new(state.store());
    let mut progress = repo.get_or_new(&user, &word.id).await?;
    record_answer(&mut progress, body.correct, Utc::now());
    repo.save(&progress).await?;
    Ok(json!({ "progress": progress }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BookmarkRequest {
    /// Explicit state; toggles when absent.
    bookmarked: Option<bool>,
}

pub(super) async fn bookmark(state: &AppState, req: &ApiRequest, word_id: &str) -> ApiResult {
    let user = state.require_user(req).await?;
    let body: BookmarkRequest = req.json_or_default()?;
    let word = word_or_404(state, word_id).await?;

    let repo = ProgressRepo::new(state.store());
    let mut progress = repo.get_or_new(&user, &word.id).await?;
    progress.bookmarked = body.bookmarked.unwrap_or(!progress.bookmarked);
    repo.save(&progress).await?;
    Ok(json!({ "progress": progress }))
}
