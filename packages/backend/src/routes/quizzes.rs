use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Extension, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vocabtamil_algo::MasteryLevel;

use crate::auth::AuthUser;
use crate::db::operations::gamification::Achievement;
use crate::db::operations::quiz::{QuestionType, QuizQuestionRecord, QuizSessionRecord, QuizType};
use crate::response::{created, ok, AppError, AppResult};
use crate::routes::{parse_json, today};
use crate::services::quiz::{
    self, HistoryPage, ProgressChange, StartQuiz, SubmitAnswer, WordResult,
};
use crate::state::AppState;

const MAX_QUIZ_WORDS: usize = 20;
const MAX_ANSWER_LEN: usize = 500;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/history", get(history))
        .route("/:id", get(get_session))
        .route("/:id/answer", post(answer))
        .route("/:id/complete", post(complete))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    quiz_type: String,
    word_ids: Vec<String>,
    #[serde(default)]
    question_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    question_id: String,
    user_answer: String,
    #[serde(default)]
    response_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    page: Option<String>,
    page_size: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    id: String,
    quiz_type: String,
    total_questions: u32,
    answered_questions: u32,
    correct_answers: u32,
    total_time_seconds: Option<u32>,
    xp_earned: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    is_completed: bool,
}

impl From<&QuizSessionRecord> for SessionView {
    fn from(session: &QuizSessionRecord) -> Self {
        Self {
            id: session.id.clone(),
            quiz_type: session.quiz_type.clone(),
            total_questions: session.total_questions,
            answered_questions: session.answered_questions,
            correct_answers: session.correct_answers,
            total_time_seconds: session.total_time_seconds,
            xp_earned: session.xp_earned,
            started_at: session.started_at,
            completed_at: session.completed_at,
            is_completed: session.is_completed(),
        }
    }
}

/// Question as shown to the learner; the answer key stays hidden until
/// the question has been answered.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionView {
    id: String,
    word_id: String,
    position: u32,
    question_type: QuestionType,
    question_text: String,
    answer_options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
    user_answer: Option<String>,
    is_correct: Option<bool>,
    xp_earned: u32,
    answered_at: Option<DateTime<Utc>>,
}

impl From<&QuizQuestionRecord> for QuestionView {
    fn from(question: &QuizQuestionRecord) -> Self {
        let answered = question.answered_at.is_some();
        Self {
            id: question.id.clone(),
            word_id: question.word_id.clone(),
            position: question.position,
            question_type: question.question_type,
            question_text: question.question_text.clone(),
            answer_options: question.answer_options.clone(),
            correct_answer: answered.then(|| question.correct_answer.clone()),
            explanation: answered.then(|| question.explanation.clone()),
            user_answer: question.user_answer.clone(),
            is_correct: question.is_correct,
            xp_earned: question.xp_earned,
            answered_at: question.answered_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionDetail {
    session: SessionView,
    questions: Vec<QuestionView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerData {
    is_correct: bool,
    correct_answer: String,
    explanation: String,
    xp_earned: u32,
    progress: ProgressChange,
    new_achievements: Vec<Achievement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_question: Option<QuestionView>,
    quiz_completed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionData {
    session: SessionView,
    accuracy: f64,
    answer_xp: u32,
    bonus_xp: u32,
    total_xp: u32,
    new_achievements: Vec<Achievement>,
    word_results: Vec<WordResult>,
    mastered_words: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryData {
    sessions: Vec<SessionView>,
    pagination: HistoryPage,
}

fn parse_quiz_type(value: &str) -> Option<QuizType> {
    match value {
        "daily" => Some(QuizType::Daily),
        "review" => Some(QuizType::Review),
        "speed" => Some(QuizType::Speed),
        "custom" => Some(QuizType::Custom),
        "placement" => Some(QuizType::Placement),
        _ => None,
    }
}

fn validate_start(payload: StartRequest) -> Result<StartQuiz, AppError> {
    let quiz_type = parse_quiz_type(&payload.quiz_type).ok_or_else(|| {
        AppError::validation("quizType must be daily, review, speed, custom or placement")
    })?;

    if payload.word_ids.is_empty() || payload.word_ids.len() > MAX_QUIZ_WORDS {
        return Err(AppError::validation("wordIds must contain between 1 and 20 ids"));
    }

    let question_types = payload
        .question_types
        .iter()
        .map(|value| {
            QuestionType::parse(value)
                .ok_or_else(|| AppError::validation(format!("Unknown question type: {value}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StartQuiz {
        quiz_type,
        word_ids: payload.word_ids,
        question_types,
    })
}

fn validate_answer(payload: AnswerRequest) -> Result<SubmitAnswer, AppError> {
    if payload.question_id.trim().is_empty() {
        return Err(AppError::validation("questionId is required"));
    }
    if payload.user_answer.chars().count() > MAX_ANSWER_LEN {
        return Err(AppError::validation("userAnswer must be at most 500 characters"));
    }
    Ok(SubmitAnswer {
        question_id: payload.question_id,
        user_answer: payload.user_answer,
        response_time: payload.response_time,
    })
}

fn parse_page(raw: Option<&str>, default: u32, max: u32) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if (1..=max).contains(&value) => Ok(value),
        _ => Err(AppError::validation("Invalid pagination parameters")),
    }
}

async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> AppResult {
    let payload: StartRequest = parse_json(&body)?;
    let request = validate_start(payload)?;

    let (session, questions) = quiz::start_quiz(&state, &auth.id, request).await?;
    Ok(created(SessionDetail {
        session: SessionView::from(&session),
        questions: questions.iter().map(QuestionView::from).collect(),
    }))
}

async fn answer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult {
    let payload: AnswerRequest = parse_json(&body)?;
    let submission = validate_answer(payload)?;

    let outcome = quiz::submit_answer(&state, &auth.id, &id, submission, today()).await?;
    Ok(ok(AnswerData {
        is_correct: outcome.is_correct,
        correct_answer: outcome.correct_answer,
        explanation: outcome.explanation,
        xp_earned: outcome.xp_earned,
        progress: outcome.progress,
        new_achievements: outcome.new_achievements,
        quiz_completed: outcome.next_question.is_none(),
        next_question: outcome.next_question.as_ref().map(QuestionView::from),
    }))
}

async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    let summary = quiz::complete_quiz(&state, &auth.id, &id, today()).await?;
    let mastered_words = summary
        .word_results
        .iter()
        .filter(|result| {
            result.mastery_after == Some(MasteryLevel::Mastered)
                && result.mastery_before != Some(MasteryLevel::Mastered)
        })
        .count();

    Ok(ok(CompletionData {
        session: SessionView::from(&summary.session),
        accuracy: summary.accuracy,
        answer_xp: summary.answer_xp,
        bonus_xp: summary.bonus_xp,
        total_xp: summary.session.xp_earned,
        new_achievements: summary.new_achievements,
        word_results: summary.word_results,
        mastered_words,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    let (session, questions) = quiz::session_with_questions(&state, &auth.id, &id).await?;
    Ok(ok(SessionDetail {
        session: SessionView::from(&session),
        questions: questions.iter().map(QuestionView::from).collect(),
    }))
}

async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> AppResult {
    let page = parse_page(query.page.as_deref(), 1, u32::MAX)?;
    let page_size = parse_page(query.page_size.as_deref(), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)?;

    let (sessions, pagination) = quiz::history(&state, &auth.id, page, page_size).await?;
    Ok(ok(HistoryData {
        sessions: sessions.iter().map(SessionView::from).collect(),
        pagination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_request(word_ids: usize, question_types: &[&str]) -> StartRequest {
        StartRequest {
            quiz_type: "daily".into(),
            word_ids: (0..word_ids).map(|i| format!("w{i}")).collect(),
            question_types: question_types.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn start_validates_word_count() {
        assert!(validate_start(start_request(0, &[])).is_err());
        assert!(validate_start(start_request(21, &[])).is_err());
        let ok = validate_start(start_request(20, &["mcq", "typing"])).unwrap();
        assert_eq!(ok.question_types, vec![QuestionType::Mcq, QuestionType::Typing]);
    }

    #[test]
    fn start_rejects_unknown_types() {
        assert!(validate_start(start_request(1, &["essay"])).is_err());
        let mut request = start_request(1, &[]);
        request.quiz_type = "marathon".into();
        assert!(validate_start(request).is_err());
    }

    #[test]
    fn answer_length_bounded() {
        let answer = |text: String| AnswerRequest {
            question_id: "q1".into(),
            user_answer: text,
            response_time: None,
        };
        assert!(validate_answer(answer("அ".repeat(500))).is_ok());
        assert!(validate_answer(answer("a".repeat(501))).is_err());
    }

    #[test]
    fn page_parsing() {
        assert_eq!(parse_page(None, 20, 100).unwrap(), 20);
        assert_eq!(parse_page(Some("3"), 20, 100).unwrap(), 3);
        assert!(parse_page(Some("0"), 20, 100).is_err());
        assert!(parse_page(Some("101"), 20, 100).is_err());
    }

    #[test]
    fn unanswered_question_hides_answer_key() {
        let question = QuizQuestionRecord {
            id: "q1".into(),
            session_id: "s1".into(),
            word_id: "w1".into(),
            position: 0,
            question_type: QuestionType::Mcq,
            question_text: "What does 'அன்பு' mean?".into(),
            correct_answer: "love".into(),
            answer_options: vec!["love".into(), "water".into()],
            explanation: String::new(),
            user_answer: None,
            is_correct: None,
            response_time: None,
            xp_earned: 0,
            mastery_before: None,
            mastery_after: None,
            answered_at: None,
        };
        let json = serde_json::to_value(QuestionView::from(&question)).unwrap();
        assert!(json.get("correctAnswer").is_none());

        let answered = QuizQuestionRecord {
            answered_at: Some(Utc::now()),
            user_answer: Some("love".into()),
            is_correct: Some(true),
            ..question
        };
        let json = serde_json::to_value(QuestionView::from(&answered)).unwrap();
        assert_eq!(json["correctAnswer"], "love");
    }
}
