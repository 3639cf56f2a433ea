use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqlitePool};

use super::{encode_string_list, get_string_list, new_id};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: String,
    pub tamil_word: String,
    pub transliteration: String,
    pub meanings: Vec<String>,
    pub example_tamil: String,
    pub example_english: String,
    pub audio_url: Option<String>,
    pub category: String,
    pub difficulty: i64,
    pub frequency_rank: Option<i64>,
}

impl Word {
    pub fn primary_meaning(&self) -> &str {
        self.meanings.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct NewWord {
    pub tamil_word: String,
    pub transliteration: String,
    pub meanings: Vec<String>,
    pub example_tamil: String,
    pub example_english: String,
    pub category: String,
    pub difficulty: i64,
    pub frequency_rank: Option<i64>,
}

pub(crate) const WORD_COLUMNS: &str = r#"
    w."id", w."tamilWord", w."transliteration", w."meanings", w."exampleTamil",
    w."exampleEnglish", w."audioUrl", w."category", w."difficulty", w."frequencyRank"
"#;

pub(crate) fn map_word(row: &SqliteRow) -> Result<Word, sqlx::Error> {
    Ok(Word {
        id: row.try_get("id")?,
        tamil_word: row.try_get("tamilWord")?,
        transliteration: row.try_get("transliteration")?,
        meanings: get_string_list(row, "meanings")?,
        example_tamil: row.try_get("exampleTamil")?,
        example_english: row.try_get("exampleEnglish")?,
        audio_url: row.try_get("audioUrl")?,
        category: row.try_get("category")?,
        difficulty: row.try_get("difficulty")?,
        frequency_rank: row.try_get("frequencyRank")?,
    })
}

pub async fn find_word<'e, E>(executor: E, id: &str) -> Result<Option<Word>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" w WHERE w."id" = ?"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    row.as_ref().map(map_word).transpose()
}

/// Words for the given ids, in the order of `ids`; unknown ids are skipped.
pub async fn find_words_by_ids(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Word>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!(r#"SELECT {WORD_COLUMNS} FROM "words" w WHERE w."id" IN ("#));
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let rows = builder.build().fetch_all(pool).await?;
    let mut words = rows.iter().map(map_word).collect::<Result<Vec<_>, _>>()?;
    words.sort_by_key(|word| ids.iter().position(|id| id == &word.id));
    Ok(words)
}

pub async fn search_words(
    pool: &SqlitePool,
    query: Option<&str>,
    category: Option<&str>,
    limit: i64,
) -> Result<Vec<Word>, sqlx::Error> {
    let pattern = query.map(|q| format!("%{}%", escape_like(q)));
    let sql = format!(
        r#"
        SELECT {WORD_COLUMNS}
        FROM "words" w
        WHERE (? IS NULL
               OR w."tamilWord" LIKE ? ESCAPE '\'
               OR w."transliteration" LIKE ? ESCAPE '\'
               OR w."meanings" LIKE ? ESCAPE '\')
          AND (? IS NULL OR w."category" = ?)
        ORDER BY w."frequencyRank" IS NULL, w."frequencyRank", w."tamilWord"
        LIMIT ?
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(pattern.as_deref())
        .bind(category)
        .bind(category)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter().map(map_word).collect()
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Words the user has never seen within a difficulty band, most frequent first.
pub async fn unseen_words(
    pool: &SqlitePool,
    user_id: &str,
    difficulty: (i64, i64),
    limit: i64,
) -> Result<Vec<Word>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {WORD_COLUMNS}
        FROM "words" w
        WHERE w."difficulty" BETWEEN ? AND ?
          AND NOT EXISTS (
            SELECT 1 FROM "word_progress" p
            WHERE p."wordId" = w."id" AND p."userId" = ?
          )
        ORDER BY w."frequencyRank" IS NULL, w."frequencyRank", RANDOM()
        LIMIT ?
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(difficulty.0)
        .bind(difficulty.1)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    rows.iter().map(map_word).collect()
}

/// A random sample of words, used as multiple-choice distractors.
pub async fn random_words(pool: &SqlitePool, limit: i64) -> Result<Vec<Word>, sqlx::Error> {
    let sql = format!(r#"SELECT {WORD_COLUMNS} FROM "words" w ORDER BY RANDOM() LIMIT ?"#);
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    rows.iter().map(map_word).collect()
}

pub async fn count_words(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "words""#)
        .fetch_one(pool)
        .await
}

/// Inserts unless a word with the same Tamil spelling exists. Returns `true` when inserted.
pub async fn insert_word(pool: &SqlitePool, word: &NewWord) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO "words" (
            "id", "tamilWord", "transliteration", "meanings", "exampleTamil",
            "exampleEnglish", "category", "difficulty", "frequencyRank", "createdAt"
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(&word.tamil_word)
    .bind(&word.transliteration)
    .bind(encode_string_list(&word.meanings))
    .bind(&word.example_tamil)
    .bind(&word.example_english)
    .bind(&word.category)
    .bind(word.difficulty)
    .bind(word.frequency_rank)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

// ==================== Word lists ====================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordList {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub word_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const LIST_SELECT: &str = r#"
    SELECT l."id", l."userId", l."name", l."description", l."isPublic",
           l."createdAt", l."updatedAt",
           (SELECT COUNT(*) FROM "word_list_items" i WHERE i."listId" = l."id") AS "wordCount"
    FROM "word_lists" l
"#;

fn map_word_list(row: &SqliteRow) -> Result<WordList, sqlx::Error> {
    Ok(WordList {
        id: row.try_get("id")?,
        user_id: row.try_get("userId")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("isPublic")?,
        word_count: row.try_get("wordCount")?,
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

/// Lists owned by the user plus everyone's public lists.
pub async fn visible_word_lists(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<WordList>, sqlx::Error> {
    let sql = format!(
        r#"{LIST_SELECT} WHERE l."userId" = ? OR l."isPublic" = 1 ORDER BY l."createdAt" DESC"#
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    rows.iter().map(map_word_list).collect()
}

pub async fn find_word_list(pool: &SqlitePool, id: &str) -> Result<Option<WordList>, sqlx::Error> {
    let sql = format!(r#"{LIST_SELECT} WHERE l."id" = ?"#);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(map_word_list).transpose()
}

pub async fn insert_word_list(
    pool: &SqlitePool,
    user_id: &str,
    name: &str,
    description: &str,
    is_public: bool,
) -> Result<WordList, sqlx::Error> {
    let id = new_id();
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO "word_lists" ("id", "userId", "name", "description", "isPublic", "createdAt", "updatedAt")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(is_public)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_word_list(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_word_list(
    pool: &SqlitePool,
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
    is_public: Option<bool>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "word_lists" SET
          "name" = COALESCE(?, "name"),
          "description" = COALESCE(?, "description"),
          "isPublic" = COALESCE(?, "isPublic"),
          "updatedAt" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(is_public)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_word_list(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "word_lists" WHERE "id" = ?"#)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns `false` when the word already was on the list.
pub async fn add_word_to_list(
    pool: &SqlitePool,
    list_id: &str,
    word_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO "word_list_items" ("listId", "wordId", "addedAt") VALUES (?, ?, ?)"#,
    )
    .bind(list_id)
    .bind(word_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns `false` when the word was not on the list.
pub async fn remove_word_from_list(
    pool: &SqlitePool,
    list_id: &str,
    word_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM "word_list_items" WHERE "listId" = ? AND "wordId" = ?"#)
        .bind(list_id)
        .bind(word_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn words_in_list(pool: &SqlitePool, list_id: &str) -> Result<Vec<Word>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {WORD_COLUMNS}
        FROM "word_list_items" i
        JOIN "words" w ON w."id" = i."wordId"
        WHERE i."listId" = ?
        ORDER BY i."addedAt"
        "#
    );
    let rows = sqlx::query(&sql).bind(list_id).fetch_all(pool).await?;
    rows.iter().map(map_word).collect()
}
