use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};

use super::{decode_error, new_id};

// ==================== XP ledger ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    Answer,
    Completion,
    Achievement,
}

impl XpSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Completion => "completion",
            Self::Achievement => "achievement",
        }
    }
}

/// Appends one ledger row. Zero amounts are not recorded.
pub async fn append_xp(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: u32,
    source: XpSource,
    source_id: &str,
    earned_on: NaiveDate,
) -> Result<(), sqlx::Error> {
    if amount == 0 {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO "xp_ledger" ("id", "userId", "amount", "source", "sourceId", "earnedOn", "createdAt")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(i64::from(amount))
    .bind(source.as_str())
    .bind(source_id)
    .bind(earned_on)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// XP earned on or after `since`; the whole ledger when `since` is `None`.
pub async fn xp_since<'e, E>(
    executor: E,
    user_id: &str,
    since: Option<NaiveDate>,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM("amount"), 0)
        FROM "xp_ledger"
        WHERE "userId" = ? AND (? IS NULL OR "earnedOn" >= ?)
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(since)
    .fetch_one(executor)
    .await
}

pub async fn total_xp<'e, E>(executor: E, user_id: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    xp_since(executor, user_id, None).await
}

// ==================== Achievements ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaType {
    WordsLearned,
    WordsMastered,
    Streak,
    Xp,
    Accuracy,
    QuizSessions,
    CategoryMastery,
    Speed,
}

impl CriteriaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WordsLearned => "words_learned",
            Self::WordsMastered => "words_mastered",
            Self::Streak => "streak",
            Self::Xp => "xp",
            Self::Accuracy => "accuracy",
            Self::QuizSessions => "quiz_sessions",
            Self::CategoryMastery => "category_mastery",
            Self::Speed => "speed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "words_learned" => Some(Self::WordsLearned),
            "words_mastered" => Some(Self::WordsMastered),
            "streak" => Some(Self::Streak),
            "xp" => Some(Self::Xp),
            "accuracy" => Some(Self::Accuracy),
            "quiz_sessions" => Some(Self::QuizSessions),
            "category_mastery" => Some(Self::CategoryMastery),
            "speed" => Some(Self::Speed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: String,
    pub criteria_type: CriteriaType,
    pub criteria_value: i64,
    pub criteria_data: serde_json::Value,
    pub xp_reward: u32,
    pub badge_color: String,
    pub is_hidden: bool,
}

impl Achievement {
    /// `criteriaData.category`, used by category mastery achievements.
    pub fn criteria_category(&self) -> Option<&str> {
        self.criteria_data.get("category").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AchievementSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: &'static str,
    pub criteria_type: CriteriaType,
    pub criteria_value: i64,
    pub criteria_category: Option<&'static str>,
    pub xp_reward: u32,
    pub badge_color: &'static str,
    pub is_hidden: bool,
}

const ACHIEVEMENT_COLUMNS: &str = r#"
    a."id", a."name", a."description", a."icon", a."category", a."criteriaType",
    a."criteriaValue", a."criteriaData", a."xpReward", a."badgeColor", a."isHidden"
"#;

fn map_achievement(row: &SqliteRow) -> Result<Achievement, sqlx::Error> {
    let criteria_type: String = row.try_get("criteriaType")?;
    let criteria_data: String = row.try_get("criteriaData")?;
    let xp_reward: i64 = row.try_get("xpReward")?;

    Ok(Achievement {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        icon: row.try_get("icon")?,
        category: row.try_get("category")?,
        criteria_type: CriteriaType::parse(&criteria_type).ok_or_else(|| {
            decode_error("criteriaType", format!("unknown criteria {criteria_type}"))
        })?,
        criteria_value: row.try_get("criteriaValue")?,
        criteria_data: serde_json::from_str(&criteria_data)
            .map_err(|err| decode_error("criteriaData", err.to_string()))?,
        xp_reward: u32::try_from(xp_reward).unwrap_or(0),
        badge_color: row.try_get("badgeColor")?,
        is_hidden: row.try_get("isHidden")?,
    })
}

/// Whole catalog ordered by target value.
pub async fn list_achievements<'e, E>(executor: E) -> Result<Vec<Achievement>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {ACHIEVEMENT_COLUMNS} FROM "achievements" a ORDER BY a."criteriaValue", a."name""#
    );
    let rows = sqlx::query(&sql).fetch_all(executor).await?;
    rows.iter().map(map_achievement).collect()
}

/// Inserts the achievement unless one with the same name exists.
pub async fn upsert_achievement(
    pool: &SqlitePool,
    seed: &AchievementSeed,
) -> Result<bool, sqlx::Error> {
    let criteria_data = match seed.criteria_category {
        Some(category) => serde_json::json!({ "category": category }),
        None => serde_json::json!({}),
    };

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO "achievements" (
            "id", "name", "description", "icon", "category", "criteriaType", "criteriaValue",
            "criteriaData", "xpReward", "badgeColor", "isHidden", "createdAt"
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(seed.name)
    .bind(seed.description)
    .bind(seed.icon)
    .bind(seed.category)
    .bind(seed.criteria_type.as_str())
    .bind(seed.criteria_value)
    .bind(criteria_data.to_string())
    .bind(i64::from(seed.xp_reward))
    .bind(seed.badge_color)
    .bind(seed.is_hidden)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Earned achievements with their award time, newest first.
pub async fn earned_achievements<'e, E>(
    executor: E,
    user_id: &str,
) -> Result<Vec<(Achievement, DateTime<Utc>)>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        SELECT {ACHIEVEMENT_COLUMNS}, ua."earnedAt"
        FROM "user_achievements" ua
        JOIN "achievements" a ON a."id" = ua."achievementId"
        WHERE ua."userId" = ?
        ORDER BY ua."earnedAt" DESC, a."name"
        "#
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(executor).await?;
    rows.iter()
        .map(|row| Ok((map_achievement(row)?, row.try_get("earnedAt")?)))
        .collect()
}

pub async fn earned_achievement_ids<'e, E>(
    executor: E,
    user_id: &str,
) -> Result<HashSet<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let ids: Vec<String> =
        sqlx::query_scalar(r#"SELECT "achievementId" FROM "user_achievements" WHERE "userId" = ?"#)
            .bind(user_id)
            .fetch_all(executor)
            .await?;
    Ok(ids.into_iter().collect())
}

/// Returns `false` when the user already holds the achievement.
pub async fn award_achievement(
    conn: &mut SqliteConnection,
    user_id: &str,
    achievement_id: &str,
    earned_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO "user_achievements" ("id", "userId", "achievementId", "earnedAt")
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(achievement_id)
    .bind(earned_at)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
