use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::db::operations::{quiz, user};
use crate::db::Database;

/// Quiz sessions never answered are dropped after this many hours.
pub const ABANDONED_QUIZ_MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupStats {
    pub expired_sessions: u64,
    pub abandoned_quizzes: u64,
}

pub async fn cleanup_sessions(db: &Database) -> Result<CleanupStats, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting session cleanup cycle");

    let now = Utc::now();
    let stats = CleanupStats {
        expired_sessions: user::delete_expired_sessions(db.pool(), now).await?,
        abandoned_quizzes: quiz::delete_abandoned_sessions(
            db.pool(),
            now - Duration::hours(ABANDONED_QUIZ_MAX_AGE_HOURS),
        )
        .await?,
    };

    info!(
        expired_sessions = stats.expired_sessions,
        abandoned_quizzes = stats.abandoned_quizzes,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Session cleanup completed"
    );

    Ok(stats)
}
