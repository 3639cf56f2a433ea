use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use super::new_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct XpStanding {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub xp: i64,
    pub words_learned: i64,
}

/// Every user with positive XP since `since`, highest first, ties by username.
pub async fn xp_standings(
    pool: &SqlitePool,
    since: Option<NaiveDate>,
) -> Result<Vec<XpStanding>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
          u."id" AS "userId",
          u."username",
          u."firstName",
          SUM(l."amount") AS "xp",
          (
            SELECT COUNT(*) FROM "word_progress" p
            WHERE p."userId" = u."id"
              AND p."learnedOn" IS NOT NULL
              AND (? IS NULL OR p."learnedOn" >= ?)
          ) AS "wordsLearned"
        FROM "xp_ledger" l
        JOIN "users" u ON u."id" = l."userId"
        WHERE (? IS NULL OR l."earnedOn" >= ?)
        GROUP BY u."id", u."username", u."firstName"
        HAVING SUM(l."amount") > 0
        ORDER BY "xp" DESC, u."username" ASC
        "#,
    )
    .bind(since)
    .bind(since)
    .bind(since)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(XpStanding {
                user_id: row.try_get("userId")?,
                username: row.try_get("username")?,
                first_name: row.try_get("firstName")?,
                xp: row.try_get("xp")?,
                words_learned: row.try_get("wordsLearned")?,
            })
        })
        .collect()
}

/// Replaces the stored snapshot of one period with `standings` (already ranked).
pub async fn replace_snapshot(
    pool: &SqlitePool,
    period: &str,
    period_start: NaiveDate,
    standings: &[XpStanding],
    updated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(r#"DELETE FROM "leaderboard_entries" WHERE "period" = ? AND "periodStart" = ?"#)
        .bind(period)
        .bind(period_start)
        .execute(&mut *tx)
        .await?;

    for (index, standing) in standings.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO "leaderboard_entries" (
                "id", "period", "periodStart", "userId", "rank", "xpEarned", "wordsLearned", "updatedAt"
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_id())
        .bind(period)
        .bind(period_start)
        .bind(&standing.user_id)
        .bind(index as i64 + 1)
        .bind(standing.xp)
        .bind(standing.words_learned)
        .bind(updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// `(userId, rank, xpEarned)` rows of a stored snapshot, by rank.
pub async fn snapshot_ranks(
    pool: &SqlitePool,
    period: &str,
    period_start: NaiveDate,
) -> Result<Vec<(String, i64, i64)>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "userId", "rank", "xpEarned" FROM "leaderboard_entries"
        WHERE "period" = ? AND "periodStart" = ?
        ORDER BY "rank"
        "#,
    )
    .bind(period)
    .bind(period_start)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok((row.try_get("userId")?, row.try_get("rank")?, row.try_get("xpEarned")?)))
        .collect()
}
