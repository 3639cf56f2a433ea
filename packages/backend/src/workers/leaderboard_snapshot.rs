use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use crate::db::Database;
use crate::services::leaderboard::snapshot_all;

/// Rewrites the stored leaderboard of every period from the XP ledger.
pub async fn refresh_snapshots(db: &Database) -> Result<usize, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting leaderboard snapshot cycle");

    let rows = snapshot_all(db.pool(), Utc::now().date_naive()).await?;

    info!(
        rows,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Leaderboard snapshot completed"
    );
    Ok(rows)
}
