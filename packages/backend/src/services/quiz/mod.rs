//! Quiz orchestration
//!
//! An answer is applied in one SQLite transaction:
//! claim the question, run the progress updater, swap the progress row,
//! book XP, record streak activity and award achievements. The claim is
//! the first write, so a duplicate submission never touches progress.
//! Per-user locks serialize a user's own requests inside this process;
//! the progress compare-and-swap covers writers outside it.

pub mod evaluation;
pub mod generator;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use vocabtamil_algo::{
    answer_xp, completion_bonus, srs, InvalidStateError, MasteryChange, MasteryLevel,
};

use crate::db::operations::gamification::{append_xp, Achievement, XpSource};
use crate::db::operations::progress::{compare_and_swap, find_or_create_progress};
use crate::db::operations::quiz::{
    self as quiz_ops, claim_question, complete_session, increment_session_counters,
    insert_session_with_questions, list_questions, next_unanswered_question,
    record_question_outcome, QuestionType, QuizQuestionRecord, QuizSessionRecord, QuizType,
};
use crate::db::operations::word::{find_words_by_ids, random_words};
use crate::response::{json_error, AppError};
use crate::services::{achievements, gamification, leaderboard};
use crate::state::AppState;

/// Attempts at the progress swap before the answer is rejected as a conflict
pub const MAX_SWAP_ATTEMPTS: usize = 3;

/// Words sampled as multiple-choice distractors
const DISTRACTOR_SAMPLE: i64 = 50;

/// Lock entries kept before idle ones are pruned
const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("Quiz session not found")]
    SessionNotFound,
    #[error("Question not found")]
    QuestionNotFound,
    #[error("Quiz session already completed")]
    AlreadyCompleted,
    #[error("Question already answered")]
    AlreadyAnswered,
    #[error("Progress was updated concurrently, please retry")]
    Conflict,
    #[error("None of the requested words exist")]
    NoWords,
    #[error("invalid progress state: {0}")]
    InvalidState(#[from] InvalidStateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::SessionNotFound | QuizError::QuestionNotFound => {
                AppError::not_found(err.to_string())
            }
            QuizError::AlreadyCompleted => json_error(
                StatusCode::BAD_REQUEST,
                "QUIZ_COMPLETED",
                err.to_string(),
            ),
            QuizError::AlreadyAnswered => json_error(
                StatusCode::CONFLICT,
                "ALREADY_ANSWERED",
                err.to_string(),
            ),
            QuizError::Conflict => AppError::conflict(err.to_string()),
            QuizError::NoWords => AppError::validation(err.to_string()),
            QuizError::InvalidState(inner) => {
                tracing::error!(error = %inner, "stored progress violates invariants");
                AppError::internal(inner.to_string())
            }
            QuizError::Database(inner) => AppError::from(inner),
        }
    }
}

/// Per-user async mutexes.
#[derive(Default)]
pub struct UserLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==================== Start ====================

#[derive(Debug, Clone)]
pub struct StartQuiz {
    pub quiz_type: QuizType,
    pub word_ids: Vec<String>,
    pub question_types: Vec<QuestionType>,
}

pub async fn start_quiz(
    state: &AppState,
    user_id: &str,
    request: StartQuiz,
) -> Result<(QuizSessionRecord, Vec<QuizQuestionRecord>), QuizError> {
    let pool = state.db().pool();

    let mut word_ids: Vec<String> = Vec::with_capacity(request.word_ids.len());
    for id in request.word_ids {
        if !word_ids.contains(&id) {
            word_ids.push(id);
        }
    }

    let words = find_words_by_ids(pool, &word_ids).await?;
    if words.is_empty() {
        return Err(QuizError::NoWords);
    }
    let distractors = random_words(pool, DISTRACTOR_SAMPLE).await?;

    let questions = {
        let mut rng = rand::rng();
        generator::generate_questions(&words, &distractors, &request.question_types, &mut rng)
    };

    let (session, questions) =
        insert_session_with_questions(pool, user_id, request.quiz_type, &questions).await?;
    tracing::info!(
        user_id,
        session_id = %session.id,
        questions = questions.len(),
        quiz_type = request.quiz_type.as_str(),
        "quiz started"
    );
    Ok((session, questions))
}

// ==================== Answer ====================

#[derive(Debug, Clone)]
pub struct SubmitAnswer {
    pub question_id: String,
    pub user_answer: String,
    pub response_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressChange {
    pub mastery_level: MasteryLevel,
    pub previous_mastery_level: MasteryLevel,
    pub mastery_change: MasteryChange,
    pub review_interval_days: u32,
    pub ease_factor: f64,
    pub next_review_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    pub xp_earned: u32,
    pub progress: ProgressChange,
    pub new_achievements: Vec<Achievement>,
    pub next_question: Option<QuizQuestionRecord>,
}

fn owned_session(
    session: Option<QuizSessionRecord>,
    user_id: &str,
) -> Result<QuizSessionRecord, QuizError> {
    match session {
        Some(session) if session.user_id == user_id => Ok(session),
        _ => Err(QuizError::SessionNotFound),
    }
}

pub async fn submit_answer(
    state: &AppState,
    user_id: &str,
    session_id: &str,
    answer: SubmitAnswer,
    today: NaiveDate,
) -> Result<AnswerOutcome, QuizError> {
    let pool = state.db().pool();

    let session = owned_session(quiz_ops::find_session(pool, session_id).await?, user_id)?;
    if session.is_completed() {
        return Err(QuizError::AlreadyCompleted);
    }
    let question = quiz_ops::find_question(pool, session_id, &answer.question_id)
        .await?
        .ok_or(QuizError::QuestionNotFound)?;
    if question.answered_at.is_some() {
        return Err(QuizError::AlreadyAnswered);
    }

    let is_correct = evaluation::is_correct(
        question.question_type,
        &answer.user_answer,
        &question.correct_answer,
    );
    let response_time = vocabtamil_algo::sanitize::response_time(answer.response_time);

    let _guard = state.user_locks().acquire(user_id).await;

    for attempt in 1..=MAX_SWAP_ATTEMPTS {
        let mut tx = pool.begin().await?;
        let applied = apply_answer(
            &mut *tx,
            user_id,
            &question,
            &answer.user_answer,
            is_correct,
            response_time,
            today,
        )
        .await;

        match applied {
            Ok((progress, xp_earned, new_achievements)) => {
                let next_question = next_unanswered_question(&mut *tx, session_id).await?;
                tx.commit().await?;

                if xp_earned > 0 || !new_achievements.is_empty() {
                    leaderboard::invalidate(state).await;
                }

                tracing::debug!(
                    user_id,
                    session_id,
                    question_id = %question.id,
                    is_correct,
                    mastery = progress.mastery_level.label(),
                    "answer recorded"
                );

                return Ok(AnswerOutcome {
                    is_correct,
                    correct_answer: question.correct_answer.clone(),
                    explanation: question.explanation.clone(),
                    xp_earned,
                    progress,
                    new_achievements,
                    next_question,
                });
            }
            Err(QuizError::Conflict) => {
                tx.rollback().await?;
                tracing::warn!(user_id, session_id, attempt, "progress swap lost, retrying");
            }
            Err(err) => return Err(err),
        }
    }

    Err(QuizError::Conflict)
}

async fn apply_answer(
    conn: &mut SqliteConnection,
    user_id: &str,
    question: &QuizQuestionRecord,
    user_answer: &str,
    is_correct: bool,
    response_time: Option<f64>,
    today: NaiveDate,
) -> Result<(ProgressChange, u32, Vec<Achievement>), QuizError> {
    let now = Utc::now();

    let session = quiz_ops::find_session(&mut *conn, &question.session_id).await?;
    if session.is_some_and(|session| session.is_completed()) {
        return Err(QuizError::AlreadyCompleted);
    }

    let claimed = claim_question(
        &mut *conn,
        &question.id,
        user_answer,
        is_correct,
        response_time,
        now,
    )
    .await?;
    if !claimed {
        return Err(QuizError::AlreadyAnswered);
    }

    let record = find_or_create_progress(&mut *conn, user_id, &question.word_id, today).await?;
    let update = srs::update(&record.progress, is_correct, response_time, today)?;
    let next = &update.progress;

    let learned_on = next.mastery_level.is_learned().then_some(today);
    let swapped =
        compare_and_swap(&mut *conn, &record.id, record.progress.times_seen, next, learned_on)
            .await?;
    if !swapped {
        return Err(QuizError::Conflict);
    }

    let xp_earned = answer_xp(is_correct);
    record_question_outcome(
        &mut *conn,
        &question.id,
        xp_earned,
        update.previous_level.ordinal(),
        next.mastery_level.ordinal(),
    )
    .await?;
    increment_session_counters(&mut *conn, &question.session_id, is_correct, xp_earned).await?;
    append_xp(&mut *conn, user_id, xp_earned, XpSource::Answer, &question.id, today).await?;

    gamification::record_activity(&mut *conn, user_id, today).await?;
    let new_achievements = achievements::check_and_award(&mut *conn, user_id, today, now).await?;

    Ok((
        ProgressChange {
            mastery_level: next.mastery_level,
            previous_mastery_level: update.previous_level,
            mastery_change: update.change,
            review_interval_days: next.review_interval_days,
            ease_factor: next.ease_factor,
            next_review_date: next.next_review_date,
        },
        xp_earned,
        new_achievements,
    ))
}

// ==================== Complete ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordResult {
    pub word_id: String,
    pub tamil_word: String,
    pub question_type: QuestionType,
    pub is_correct: Option<bool>,
    pub mastery_before: Option<MasteryLevel>,
    pub mastery_after: Option<MasteryLevel>,
}

#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub session: QuizSessionRecord,
    pub accuracy: f64,
    pub answer_xp: u32,
    pub bonus_xp: u32,
    pub new_achievements: Vec<Achievement>,
    pub word_results: Vec<WordResult>,
}

pub async fn complete_quiz(
    state: &AppState,
    user_id: &str,
    session_id: &str,
    today: NaiveDate,
) -> Result<CompletionSummary, QuizError> {
    let pool = state.db().pool();
    let _guard = state.user_locks().acquire(user_id).await;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    let session = owned_session(quiz_ops::find_session(&mut *tx, session_id).await?, user_id)?;
    if session.is_completed() {
        return Err(QuizError::AlreadyCompleted);
    }

    let total_time = session
        .total_time_seconds
        .unwrap_or_else(|| elapsed_seconds(session.started_at, now));
    let bonus_xp = completion_bonus(session.correct_answers, session.total_questions, total_time);

    if !complete_session(&mut *tx, session_id, total_time, bonus_xp, now).await? {
        return Err(QuizError::AlreadyCompleted);
    }
    append_xp(&mut *tx, user_id, bonus_xp, XpSource::Completion, session_id, today).await?;
    gamification::record_activity(&mut *tx, user_id, today).await?;
    let new_achievements = achievements::check_and_award(&mut *tx, user_id, today, now).await?;

    let session = quiz_ops::find_session(&mut *tx, session_id)
        .await?
        .ok_or(QuizError::SessionNotFound)?;
    let questions = list_questions(&mut *tx, session_id).await?;
    tx.commit().await?;

    leaderboard::invalidate(state).await;

    let word_ids: Vec<String> = questions.iter().map(|q| q.word_id.clone()).collect();
    let words = find_words_by_ids(pool, &word_ids).await?;
    let word_results = questions
        .iter()
        .map(|question| WordResult {
            word_id: question.word_id.clone(),
            tamil_word: words
                .iter()
                .find(|word| word.id == question.word_id)
                .map(|word| word.tamil_word.clone())
                .unwrap_or_default(),
            question_type: question.question_type,
            is_correct: question.is_correct,
            mastery_before: question.mastery_before.and_then(MasteryLevel::from_ordinal),
            mastery_after: question.mastery_after.and_then(MasteryLevel::from_ordinal),
        })
        .collect();

    tracing::info!(
        user_id,
        session_id,
        correct = session.correct_answers,
        total = session.total_questions,
        bonus_xp,
        "quiz completed"
    );

    Ok(CompletionSummary {
        accuracy: vocabtamil_algo::gamification::accuracy_percentage(
            session.correct_answers,
            session.total_questions,
        ),
        answer_xp: session.xp_earned.saturating_sub(bonus_xp),
        bonus_xp,
        new_achievements,
        word_results,
        session,
    })
}

fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    u32::try_from((now - started_at).num_seconds().max(0)).unwrap_or(u32::MAX)
}

// ==================== Read ====================

pub async fn session_with_questions(
    state: &AppState,
    user_id: &str,
    session_id: &str,
) -> Result<(QuizSessionRecord, Vec<QuizQuestionRecord>), QuizError> {
    let pool = state.db().pool();
    let session = owned_session(quiz_ops::find_session(pool, session_id).await?, user_id)?;
    let questions = list_questions(pool, session_id).await?;
    Ok((session, questions))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub page: u32,
    pub page_size: u32,
    pub total: i64,
}

pub async fn history(
    state: &AppState,
    user_id: &str,
    page: u32,
    page_size: u32,
) -> Result<(Vec<QuizSessionRecord>, HistoryPage), QuizError> {
    let page = page.max(1);
    let (sessions, total) =
        quiz_ops::session_history(state.db().pool(), user_id, page, page_size).await?;
    Ok((
        sessions,
        HistoryPage {
            page,
            page_size,
            total,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn user_lock_serializes_same_user() {
        let locks = Arc::new(UserLocks::default());
        let guard = locks.acquire("u1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("u1").await;
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = UserLocks::default();
        let _a = locks.acquire("a").await;
        let _b = locks.acquire("b").await;
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn elapsed_seconds_clamps_clock_skew() {
        let now = Utc::now();
        assert_eq!(elapsed_seconds(now - Duration::seconds(90), now), 90);
        assert_eq!(elapsed_seconds(now + Duration::seconds(5), now), 0);
    }

    #[test]
    fn quiz_errors_map_to_http_statuses() {
        let status = |err: QuizError| AppError::from(err).status();
        assert_eq!(status(QuizError::SessionNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(QuizError::AlreadyCompleted), StatusCode::BAD_REQUEST);
        assert_eq!(status(QuizError::AlreadyAnswered), StatusCode::CONFLICT);
        assert_eq!(status(QuizError::Conflict), StatusCode::CONFLICT);
        assert_eq!(status(QuizError::NoWords), StatusCode::BAD_REQUEST);
    }
}
