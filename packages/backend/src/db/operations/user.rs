use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use vocabtamil_algo::StreakState;

use super::{get_u32, new_id};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamilLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl TamilLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    /// Inclusive word difficulty range offered as new words at this level.
    pub fn difficulty_range(self) -> (i64, i64) {
        match self {
            Self::Beginner => (1, 2),
            Self::Intermediate => (2, 4),
            Self::Advanced => (3, 5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tamil_level: TamilLevel,
    pub daily_word_goal: u32,
    pub ui_language: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn streak(&self) -> StreakState {
        StreakState {
            current: self.current_streak,
            longest: self.longest_streak,
            last_activity_date: self.last_activity_date,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub tamil_level: TamilLevel,
    pub daily_word_goal: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tamil_level: Option<TamilLevel>,
    pub daily_word_goal: Option<u32>,
    pub ui_language: Option<String>,
}

const USER_COLUMNS: &str = r#"
    "id", "username", "email", "passwordHash", "firstName", "lastName",
    "tamilLevel", "dailyWordGoal", "uiLanguage", "currentStreak",
    "longestStreak", "lastActivityDate", "createdAt", "updatedAt"
"#;

fn map_user(row: &SqliteRow) -> Result<UserRecord, sqlx::Error> {
    let tamil_level: String = row.try_get("tamilLevel")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("passwordHash")?,
        first_name: row.try_get("firstName")?,
        last_name: row.try_get("lastName")?,
        tamil_level: TamilLevel::parse(&tamil_level).unwrap_or_default(),
        daily_word_goal: get_u32(row, "dailyWordGoal")?,
        ui_language: row.try_get("uiLanguage")?,
        current_streak: get_u32(row, "currentStreak")?,
        longest_streak: get_u32(row, "longestStreak")?,
        last_activity_date: row.try_get("lastActivityDate")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

pub async fn insert_user(pool: &SqlitePool, new_user: &NewUser) -> Result<UserRecord, sqlx::Error> {
    let id = new_id();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO "users" (
            "id", "username", "email", "passwordHash", "firstName", "lastName",
            "tamilLevel", "dailyWordGoal", "createdAt", "updatedAt"
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(new_user.tamil_level.as_str())
    .bind(i64::from(new_user.daily_word_goal))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_user_by_id(pool, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_user_by_id<'e, E>(executor: E, id: &str) -> Result<Option<UserRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE "id" = ?"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(map_user).transpose()
}

pub async fn find_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE lower("email") = lower(?)"#);
    let row = sqlx::query(&sql).bind(email).fetch_optional(pool).await?;
    row.as_ref().map(map_user).transpose()
}

/// `(username_taken, email_taken)`, both compared case-insensitively.
pub async fn identity_taken(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<(bool, bool), sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
          EXISTS(SELECT 1 FROM "users" WHERE lower("username") = lower(?)) AS "usernameTaken",
          EXISTS(SELECT 1 FROM "users" WHERE lower("email") = lower(?)) AS "emailTaken"
        "#,
    )
    .bind(username)
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok((row.try_get("usernameTaken")?, row.try_get("emailTaken")?))
}

pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "users" SET
          "firstName" = COALESCE(?, "firstName"),
          "lastName" = COALESCE(?, "lastName"),
          "tamilLevel" = COALESCE(?, "tamilLevel"),
          "dailyWordGoal" = COALESCE(?, "dailyWordGoal"),
          "uiLanguage" = COALESCE(?, "uiLanguage"),
          "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(update.first_name.as_deref())
    .bind(update.last_name.as_deref())
    .bind(update.tamil_level.map(TamilLevel::as_str))
    .bind(update.daily_word_goal.map(i64::from))
    .bind(update.ui_language.as_deref())
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn save_streak<'e, E>(
    executor: E,
    user_id: &str,
    streak: &StreakState,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE "users"
        SET "currentStreak" = ?, "longestStreak" = ?, "lastActivityDate" = ?, "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(i64::from(streak.current))
    .bind(i64::from(streak.longest))
    .bind(streak.last_activity_date)
    .bind(Utc::now())
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn all_user_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT "id" FROM "users" ORDER BY "createdAt""#)
        .fetch_all(pool)
        .await
}

// ==================== Sessions ====================

pub async fn insert_session(
    pool: &SqlitePool,
    user_id: &str,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "sessions" ("id", "userId", "token", "expiresAt", "createdAt")
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// `(userId, expiresAt)` of the session stored under `token_hash`.
pub async fn find_session(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<(String, DateTime<Utc>)>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT "userId", "expiresAt" FROM "sessions" WHERE "token" = ?"#)
        .bind(token_hash)
        .fetch_optional(pool)
        .await?;

    row.map(|row| Ok((row.try_get("userId")?, row.try_get("expiresAt")?)))
        .transpose()
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "sessions" WHERE "token" = ?"#)
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_expired_sessions(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "sessions" WHERE "expiresAt" < ?"#)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
