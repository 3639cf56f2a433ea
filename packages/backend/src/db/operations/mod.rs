pub mod gamification;
pub mod leaderboard;
pub mod progress;
pub mod quiz;
pub mod user;
pub mod word;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn decode_error(column: &str, message: impl Into<String>) -> sqlx::Error {
    let message: String = message.into();
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: message.into(),
    }
}

/// Reads a non-negative INTEGER column into `u32`.
pub(crate) fn get_u32(row: &SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value).map_err(|_| decode_error(column, format!("{value} out of u32 range")))
}

/// Reads a TEXT column holding a JSON array of strings.
pub(crate) fn get_string_list(row: &SqliteRow, column: &str) -> Result<Vec<String>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).map_err(|err| decode_error(column, err.to_string()))
}

pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}
