use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use super::{encode_string_list, get_string_list, get_u32, new_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Daily,
    Review,
    Speed,
    Custom,
    Placement,
}

impl QuizType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Review => "review",
            Self::Speed => "speed",
            Self::Custom => "custom",
            Self::Placement => "placement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    FillBlank,
    Audio,
    Typing,
    Match,
}

impl QuestionType {
    pub const DEFAULTS: [QuestionType; 3] =
        [QuestionType::Mcq, QuestionType::FillBlank, QuestionType::Audio];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::FillBlank => "fill_blank",
            Self::Audio => "audio",
            Self::Typing => "typing",
            Self::Match => "match",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mcq" => Some(Self::Mcq),
            "fill_blank" => Some(Self::FillBlank),
            "audio" => Some(Self::Audio),
            "typing" => Some(Self::Typing),
            "match" => Some(Self::Match),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuizSessionRecord {
    pub id: String,
    pub user_id: String,
    pub quiz_type: String,
    pub total_questions: u32,
    pub answered_questions: u32,
    pub correct_answers: u32,
    pub total_time_seconds: Option<u32>,
    pub xp_earned: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizSessionRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct QuizQuestionRecord {
    pub id: String,
    pub session_id: String,
    pub word_id: String,
    pub position: u32,
    pub question_type: QuestionType,
    pub question_text: String,
    pub correct_answer: String,
    pub answer_options: Vec<String>,
    pub explanation: String,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub response_time: Option<f64>,
    pub xp_earned: u32,
    pub mastery_before: Option<i64>,
    pub mastery_after: Option<i64>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub word_id: String,
    pub question_type: QuestionType,
    pub question_text: String,
    pub correct_answer: String,
    pub answer_options: Vec<String>,
    pub explanation: String,
}

const SESSION_COLUMNS: &str = r#"
    "id", "userId", "quizType", "totalQuestions", "answeredQuestions", "correctAnswers",
    "totalTimeSeconds", "xpEarned", "startedAt", "completedAt"
"#;

const QUESTION_COLUMNS: &str = r#"
    "id", "sessionId", "wordId", "position", "questionType", "questionText",
    "correctAnswer", "answerOptions", "explanation", "userAnswer", "isCorrect",
    "responseTime", "xpEarned", "masteryBefore", "masteryAfter", "answeredAt"
"#;

fn map_session(row: &SqliteRow) -> Result<QuizSessionRecord, sqlx::Error> {
    let total_time: Option<i64> = row.try_get("totalTimeSeconds")?;
    Ok(QuizSessionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        quiz_type: row.try_get("quizType")?,
        total_questions: get_u32(row, "totalQuestions")?,
        answered_questions: get_u32(row, "answeredQuestions")?,
        correct_answers: get_u32(row, "correctAnswers")?,
        total_time_seconds: total_time.map(|v| v.clamp(0, i64::from(u32::MAX)) as u32),
        xp_earned: get_u32(row, "xpEarned")?,
        started_at: row.try_get("startedAt")?,
        completed_at: row.try_get("completedAt")?,
    })
}

fn map_question(row: &SqliteRow) -> Result<QuizQuestionRecord, sqlx::Error> {
    let question_type: String = row.try_get("questionType")?;
    Ok(QuizQuestionRecord {
        id: row.try_get("id")?,
        session_id: row.try_get("sessionId")?,
        word_id: row.try_get("wordId")?,
        position: get_u32(row, "position")?,
        question_type: QuestionType::parse(&question_type).ok_or_else(|| {
            super::decode_error("questionType", format!("unknown question type {question_type}"))
        })?,
        question_text: row.try_get("questionText")?,
        correct_answer: row.try_get("correctAnswer")?,
        answer_options: get_string_list(row, "answerOptions")?,
        explanation: row.try_get("explanation")?,
        user_answer: row.try_get("userAnswer")?,
        is_correct: row.try_get("isCorrect")?,
        response_time: row.try_get("responseTime")?,
        xp_earned: get_u32(row, "xpEarned")?,
        mastery_before: row.try_get("masteryBefore")?,
        mastery_after: row.try_get("masteryAfter")?,
        answered_at: row.try_get("answeredAt")?,
    })
}

/// Creates the session and all of its questions in one transaction.
pub async fn insert_session_with_questions(
    pool: &SqlitePool,
    user_id: &str,
    quiz_type: QuizType,
    questions: &[NewQuestion],
) -> Result<(QuizSessionRecord, Vec<QuizQuestionRecord>), sqlx::Error> {
    let session_id = new_id();
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO "quiz_sessions" ("id", "userId", "quizType", "totalQuestions", "startedAt")
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(quiz_type.as_str())
    .bind(questions.len() as i64)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for (position, question) in questions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "quiz_questions" (
                "id", "sessionId", "wordId", "position", "questionType", "questionText",
                "correctAnswer", "answerOptions", "explanation", "createdAt"
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_id())
        .bind(&session_id)
        .bind(&question.word_id)
        .bind(position as i64)
        .bind(question.question_type.as_str())
        .bind(&question.question_text)
        .bind(&question.correct_answer)
        .bind(encode_string_list(&question.answer_options))
        .bind(&question.explanation)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let session = find_session(&mut *tx, &session_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    let inserted = list_questions(&mut *tx, &session_id).await?;
    tx.commit().await?;

    Ok((session, inserted))
}

pub async fn find_session<'e, E>(
    executor: E,
    session_id: &str,
) -> Result<Option<QuizSessionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {SESSION_COLUMNS} FROM "quiz_sessions" WHERE "id" = ?"#);
    let row = sqlx::query(&sql)
        .bind(session_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_session).transpose()
}

pub async fn find_question<'e, E>(
    executor: E,
    session_id: &str,
    question_id: &str,
) -> Result<Option<QuizQuestionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {QUESTION_COLUMNS} FROM "quiz_questions" WHERE "id" = ? AND "sessionId" = ?"#
    );
    let row = sqlx::query(&sql)
        .bind(question_id)
        .bind(session_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_question).transpose()
}

pub async fn list_questions<'e, E>(
    executor: E,
    session_id: &str,
) -> Result<Vec<QuizQuestionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {QUESTION_COLUMNS} FROM "quiz_questions" WHERE "sessionId" = ? ORDER BY "position""#
    );
    let rows = sqlx::query(&sql)
        .bind(session_id)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_question).collect()
}

pub async fn next_unanswered_question<'e, E>(
    executor: E,
    session_id: &str,
) -> Result<Option<QuizQuestionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT {QUESTION_COLUMNS} FROM "quiz_questions"
        WHERE "sessionId" = ? AND "answeredAt" IS NULL
        ORDER BY "position"
        LIMIT 1
        "#
    );
    let row = sqlx::query(&sql)
        .bind(session_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_question).transpose()
}

/// Records the answer unless the question was already answered.
/// Returns `false` for a duplicate submission.
pub async fn claim_question(
    conn: &mut SqliteConnection,
    question_id: &str,
    user_answer: &str,
    is_correct: bool,
    response_time: Option<f64>,
    answered_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "quiz_questions"
        SET "userAnswer" = ?, "isCorrect" = ?, "responseTime" = ?, "answeredAt" = ?
        WHERE "id" = ? AND "answeredAt" IS NULL
        "#,
    )
    .bind(user_answer)
    .bind(is_correct)
    .bind(response_time)
    .bind(answered_at)
    .bind(question_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn record_question_outcome(
    conn: &mut SqliteConnection,
    question_id: &str,
    xp_earned: u32,
    mastery_before: i64,
    mastery_after: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "quiz_questions"
        SET "xpEarned" = ?, "masteryBefore" = ?, "masteryAfter" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(i64::from(xp_earned))
    .bind(mastery_before)
    .bind(mastery_after)
    .bind(question_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn increment_session_counters(
    conn: &mut SqliteConnection,
    session_id: &str,
    correct: bool,
    xp_earned: u32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "quiz_sessions"
        SET "answeredQuestions" = "answeredQuestions" + 1,
            "correctAnswers" = "correctAnswers" + ?,
            "xpEarned" = "xpEarned" + ?
        WHERE "id" = ?
        "#,
    )
    .bind(i64::from(correct))
    .bind(i64::from(xp_earned))
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Marks the session completed unless it already was. Returns `false` if it was.
pub async fn complete_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    total_time_seconds: u32,
    bonus_xp: u32,
    completed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "quiz_sessions"
        SET "completedAt" = ?,
            "totalTimeSeconds" = ?,
            "xpEarned" = "xpEarned" + ?
        WHERE "id" = ? AND "completedAt" IS NULL
        "#,
    )
    .bind(completed_at)
    .bind(i64::from(total_time_seconds))
    .bind(i64::from(bonus_xp))
    .bind(session_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn count_completed_sessions<'e, E>(executor: E, user_id: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "quiz_sessions" WHERE "userId" = ? AND "completedAt" IS NOT NULL"#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub completed_sessions: i64,
    pub total_time_seconds: i64,
}

pub async fn session_totals_since(
    pool: &SqlitePool,
    user_id: &str,
    since: Option<DateTime<Utc>>,
) -> Result<SessionTotals, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS "completed", COALESCE(SUM("totalTimeSeconds"), 0) AS "seconds"
        FROM "quiz_sessions"
        WHERE "userId" = ? AND "completedAt" IS NOT NULL AND (? IS NULL OR "completedAt" >= ?)
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(SessionTotals {
        completed_sessions: row.try_get("completed")?,
        total_time_seconds: row.try_get("seconds")?,
    })
}

/// One page of a user's sessions, newest first, plus the total count.
pub async fn session_history(
    pool: &SqlitePool,
    user_id: &str,
    page: u32,
    page_size: u32,
) -> Result<(Vec<QuizSessionRecord>, i64), sqlx::Error> {
    let total: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM "quiz_sessions" WHERE "userId" = ?"#)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
    let sql = format!(
        r#"
        SELECT {SESSION_COLUMNS} FROM "quiz_sessions"
        WHERE "userId" = ?
        ORDER BY "startedAt" DESC
        LIMIT ? OFFSET ?
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let sessions = rows.iter().map(map_session).collect::<Result<Vec<_>, _>>()?;
    Ok((sessions, total))
}

/// Deletes sessions that were never completed and started before `cutoff`.
pub async fn delete_abandoned_sessions(
    pool: &SqlitePool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM "quiz_sessions"
        WHERE "completedAt" IS NULL AND "answeredQuestions" = 0 AND "startedAt" < ?
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
