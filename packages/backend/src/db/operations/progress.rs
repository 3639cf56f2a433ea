use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use vocabtamil_algo::{MasteryLevel, WordProgress};

use super::word::{map_word, Word, WORD_COLUMNS};
use super::{decode_error, get_u32, new_id};

/// Stored progress of one user-word pair.
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub id: String,
    pub user_id: String,
    pub word_id: String,
    pub progress: WordProgress,
    /// Day the word first reached `Learning`
    pub learned_on: Option<NaiveDate>,
    pub first_seen_at: DateTime<Utc>,
    pub last_reviewed_at: DateTime<Utc>,
}

const PROGRESS_COLUMNS: &str = r#"
    p."id" AS "progressId", p."userId", p."wordId", p."masteryLevel", p."timesSeen",
    p."timesCorrect", p."timesIncorrect", p."nextReviewDate", p."reviewIntervalDays",
    p."easeFactor", p."averageResponseTime", p."lastResponseTime", p."learnedOn",
    p."firstSeenAt", p."lastReviewedAt"
"#;

fn map_progress(row: &SqliteRow) -> Result<ProgressRecord, sqlx::Error> {
    let level: i64 = row.try_get("masteryLevel")?;
    let mastery_level = MasteryLevel::from_ordinal(level)
        .ok_or_else(|| decode_error("masteryLevel", format!("unknown mastery level {level}")))?;

    Ok(ProgressRecord {
        id: row.try_get("progressId")?,
        user_id: row.try_get("userId")?,
        word_id: row.try_get("wordId")?,
        progress: WordProgress {
            mastery_level,
            times_seen: get_u32(row, "timesSeen")?,
            times_correct: get_u32(row, "timesCorrect")?,
            times_incorrect: get_u32(row, "timesIncorrect")?,
            next_review_date: row.try_get("nextReviewDate")?,
            review_interval_days: get_u32(row, "reviewIntervalDays")?,
            ease_factor: row.try_get("easeFactor")?,
            average_response_time: row.try_get("averageResponseTime")?,
            last_response_time: row.try_get("lastResponseTime")?,
        },
        learned_on: row.try_get("learnedOn")?,
        first_seen_at: row.try_get("firstSeenAt")?,
        last_reviewed_at: row.try_get("lastReviewedAt")?,
    })
}

pub async fn find_progress<'e, E>(
    executor: E,
    user_id: &str,
    word_id: &str,
) -> Result<Option<ProgressRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"SELECT {PROGRESS_COLUMNS} FROM "word_progress" p WHERE p."userId" = ? AND p."wordId" = ?"#
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(word_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_progress).transpose()
}

/// Loads the progress row, creating the first-exposure default when missing.
pub async fn find_or_create_progress(
    conn: &mut SqliteConnection,
    user_id: &str,
    word_id: &str,
    today: NaiveDate,
) -> Result<ProgressRecord, sqlx::Error> {
    if let Some(record) = find_progress(&mut *conn, user_id, word_id).await? {
        return Ok(record);
    }

    let initial = WordProgress::new_for(today);
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO "word_progress" (
            "id", "userId", "wordId", "masteryLevel", "timesSeen", "timesCorrect",
            "timesIncorrect", "nextReviewDate", "reviewIntervalDays", "easeFactor",
            "firstSeenAt", "lastReviewedAt"
        )
        VALUES (?, ?, ?, ?, 0, 0, 0, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(word_id)
    .bind(initial.mastery_level.ordinal())
    .bind(initial.next_review_date)
    .bind(i64::from(initial.review_interval_days))
    .bind(initial.ease_factor)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    find_progress(&mut *conn, user_id, word_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

/// Writes `next` only if the row still has `expected_times_seen`.
/// Returns `false` when another writer got there first.
pub async fn compare_and_swap(
    conn: &mut SqliteConnection,
    record_id: &str,
    expected_times_seen: u32,
    next: &WordProgress,
    learned_on: Option<NaiveDate>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE "word_progress" SET
          "masteryLevel" = ?,
          "timesSeen" = ?,
          "timesCorrect" = ?,
          "timesIncorrect" = ?,
          "nextReviewDate" = ?,
          "reviewIntervalDays" = ?,
          "easeFactor" = ?,
          "averageResponseTime" = ?,
          "lastResponseTime" = ?,
          "learnedOn" = COALESCE("learnedOn", ?),
          "lastReviewedAt" = ?
        WHERE "id" = ? AND "timesSeen" = ?
        "#,
    )
    .bind(next.mastery_level.ordinal())
    .bind(i64::from(next.times_seen))
    .bind(i64::from(next.times_correct))
    .bind(i64::from(next.times_incorrect))
    .bind(next.next_review_date)
    .bind(i64::from(next.review_interval_days))
    .bind(next.ease_factor)
    .bind(next.average_response_time)
    .bind(next.last_response_time)
    .bind(learned_on)
    .bind(Utc::now())
    .bind(record_id)
    .bind(i64::from(expected_times_seen))
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Promotes a `New` word to `Learning` without touching counters or schedule.
pub async fn mark_learned(
    pool: &SqlitePool,
    user_id: &str,
    word_id: &str,
    today: NaiveDate,
) -> Result<ProgressRecord, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let record = find_or_create_progress(&mut *tx, user_id, word_id, today).await?;

    sqlx::query(
        r#"
        UPDATE "word_progress"
        SET "masteryLevel" = ?, "learnedOn" = COALESCE("learnedOn", ?), "lastReviewedAt" = ?
        WHERE "id" = ? AND "masteryLevel" = ?
        "#,
    )
    .bind(MasteryLevel::Learning.ordinal())
    .bind(today)
    .bind(Utc::now())
    .bind(&record.id)
    .bind(MasteryLevel::New.ordinal())
    .execute(&mut *tx)
    .await?;

    let updated = find_progress(&mut *tx, user_id, word_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    tx.commit().await?;
    Ok(updated)
}

/// Words due on or before `today` that are not yet mastered, earliest first.
pub async fn due_reviews(
    pool: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
    limit: i64,
) -> Result<Vec<(Word, ProgressRecord)>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {WORD_COLUMNS}, {PROGRESS_COLUMNS}
        FROM "word_progress" p
        JOIN "words" w ON w."id" = p."wordId"
        WHERE p."userId" = ? AND p."nextReviewDate" <= ? AND p."masteryLevel" < ?
        ORDER BY p."nextReviewDate", w."tamilWord"
        LIMIT ?
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(today)
        .bind(MasteryLevel::Mastered.ordinal())
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| Ok((map_word(row)?, map_progress(row)?)))
        .collect()
}

/// Seen at least three times but answered correctly fewer than twice, lowest accuracy first.
pub async fn weak_words(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<(Word, ProgressRecord)>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {WORD_COLUMNS}, {PROGRESS_COLUMNS}
        FROM "word_progress" p
        JOIN "words" w ON w."id" = p."wordId"
        WHERE p."userId" = ? AND p."timesSeen" >= 3 AND p."timesCorrect" < 2
        ORDER BY CAST(p."timesCorrect" AS REAL) / p."timesSeen", w."tamilWord"
        LIMIT ?
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter()
        .map(|row| Ok((map_word(row)?, map_progress(row)?)))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningTotals {
    pub words_learned: i64,
    pub words_mastered: i64,
    pub times_seen: i64,
    pub times_correct: i64,
}

impl LearningTotals {
    pub fn accuracy_percentage(&self) -> f64 {
        if self.times_seen <= 0 {
            return 0.0;
        }
        (self.times_correct as f64 / self.times_seen as f64 * 100.0).clamp(0.0, 100.0)
    }
}

pub async fn learning_totals<'e, E>(executor: E, user_id: &str) -> Result<LearningTotals, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT
          COALESCE(SUM(CASE WHEN "masteryLevel" >= 1 THEN 1 ELSE 0 END), 0) AS "wordsLearned",
          COALESCE(SUM(CASE WHEN "masteryLevel" = 3 THEN 1 ELSE 0 END), 0) AS "wordsMastered",
          COALESCE(SUM("timesSeen"), 0) AS "timesSeen",
          COALESCE(SUM("timesCorrect"), 0) AS "timesCorrect"
        FROM "word_progress"
        WHERE "userId" = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Ok(LearningTotals {
        words_learned: row.try_get("wordsLearned")?,
        words_mastered: row.try_get("wordsMastered")?,
        times_seen: row.try_get("timesSeen")?,
        times_correct: row.try_get("timesCorrect")?,
    })
}

/// Row counts per mastery level, indexed by ordinal. Never-seen words are not included.
pub async fn mastery_counts(pool: &SqlitePool, user_id: &str) -> Result<[i64; 4], sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT "masteryLevel", COUNT(*) AS "count"
        FROM "word_progress"
        WHERE "userId" = ?
        GROUP BY "masteryLevel"
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut counts = [0i64; 4];
    for row in rows {
        let level: i64 = row.try_get("masteryLevel")?;
        if let Some(level) = MasteryLevel::from_ordinal(level) {
            counts[level.ordinal() as usize] = row.try_get("count")?;
        }
    }
    Ok(counts)
}

pub async fn learned_since(
    pool: &SqlitePool,
    user_id: &str,
    since: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "word_progress" WHERE "userId" = ? AND "learnedOn" >= ?"#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounts {
    pub category: String,
    pub total_words: i64,
    pub words_learned: i64,
    pub words_mastered: i64,
}

pub async fn category_counts(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<CategoryCounts>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT
          w."category",
          COUNT(*) AS "totalWords",
          COALESCE(SUM(CASE WHEN p."masteryLevel" >= 1 THEN 1 ELSE 0 END), 0) AS "wordsLearned",
          COALESCE(SUM(CASE WHEN p."masteryLevel" = 3 THEN 1 ELSE 0 END), 0) AS "wordsMastered"
        FROM "words" w
        LEFT JOIN "word_progress" p ON p."wordId" = w."id" AND p."userId" = ?
        GROUP BY w."category"
        ORDER BY w."category"
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryCounts {
                category: row.try_get("category")?,
                total_words: row.try_get("totalWords")?,
                words_learned: row.try_get("wordsLearned")?,
                words_mastered: row.try_get("wordsMastered")?,
            })
        })
        .collect()
}

pub async fn mastered_in_category<'e, E>(
    executor: E,
    user_id: &str,
    category: &str,
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM "word_progress" p
        JOIN "words" w ON w."id" = p."wordId"
        WHERE p."userId" = ? AND p."masteryLevel" = 3 AND w."category" = ?
        "#,
    )
    .bind(user_id)
    .bind(category)
    .fetch_one(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::operations::user::{insert_user, NewUser, TamilLevel};
    use crate::db::Database;

    async fn seeded_pair(db: &Database) -> (String, String) {
        let user = insert_user(
            db.pool(),
            &NewUser {
                username: "kavitha".to_string(),
                email: "kavitha@example.com".to_string(),
                password_hash: "x".to_string(),
                first_name: "Kavitha".to_string(),
                last_name: String::new(),
                tamil_level: TamilLevel::Beginner,
                daily_word_goal: 10,
            },
        )
        .await
        .unwrap();
        crate::seed::seed_sample_words(db).await.unwrap();
        let word_id: String = sqlx::query_scalar(r#"SELECT "id" FROM "words" LIMIT 1"#)
            .fetch_one(db.pool())
            .await
            .unwrap();
        (user.id, word_id)
    }

    #[tokio::test]
    async fn stale_swap_leaves_row_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("p.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();
        let (user_id, word_id) = seeded_pair(&db).await;
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let record = find_or_create_progress(&mut *conn, &user_id, &word_id, today)
            .await
            .unwrap();
        assert_eq!(record.progress.times_seen, 0);

        let first = vocabtamil_algo::srs::update(&record.progress, true, None, today).unwrap();
        let swapped = compare_and_swap(&mut *conn, &record.id, 0, &first.progress, Some(today))
            .await
            .unwrap();
        assert!(swapped);

        // a second writer still holding the times_seen = 0 snapshot loses
        let stale = vocabtamil_algo::srs::update(&record.progress, false, None, today).unwrap();
        let swapped = compare_and_swap(&mut *conn, &record.id, 0, &stale.progress, None)
            .await
            .unwrap();
        assert!(!swapped);

        let stored = find_progress(&mut *conn, &user_id, &word_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.progress.times_seen, 1);
        assert_eq!(stored.progress.times_correct, 1);
        assert_eq!(stored.progress.times_incorrect, 0);
        assert_eq!(stored.progress.review_interval_days, 3);
        assert_eq!(stored.progress.ease_factor, 2.6);
        assert_eq!(stored.progress.mastery_level, MasteryLevel::Learning);
        assert_eq!(stored.learned_on, Some(today));
    }
}
