use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::cache::keys::{leaderboard_key, LEADERBOARD_PATTERN, LEADERBOARD_TTL};
use crate::db::operations::leaderboard::{replace_snapshot, xp_standings, XpStanding};
use crate::state::AppState;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    pub const ALL: [LeaderboardPeriod; 4] = [
        LeaderboardPeriod::Daily,
        LeaderboardPeriod::Weekly,
        LeaderboardPeriod::Monthly,
        LeaderboardPeriod::AllTime,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "all_time" => Some(Self::AllTime),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
        }
    }

    /// First ledger day counted for the period containing `today`; `None` for all time.
    /// Weeks start on Monday.
    pub fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Daily => Some(today),
            Self::Weekly => {
                Some(today - Duration::days(i64::from(today.weekday().num_days_from_monday())))
            }
            Self::Monthly => Some(today.with_day(1).unwrap_or(today)),
            Self::AllTime => None,
        }
    }

    /// Key date under which snapshots of the period are stored; 1970-01-01 for all time.
    pub fn snapshot_start(self, today: NaiveDate) -> NaiveDate {
        self.start(today).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardUser {
    pub id: String,
    pub username: String,
    pub first_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user: LeaderboardUser,
    pub xp: i64,
    pub words_learned: i64,
    pub is_current_user: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub period: LeaderboardPeriod,
    pub period_start: Option<NaiveDate>,
    pub entries: Vec<LeaderboardEntry>,
    /// Rank of the requesting user, also when outside the returned entries
    pub current_user_rank: Option<usize>,
    pub current_user_xp: i64,
    pub total_participants: usize,
}

/// Ranks are positions in `standings`, which are already ordered by XP
/// then username.
pub fn rank_standings(
    standings: &[XpStanding],
    current_user_id: &str,
    limit: usize,
    period: LeaderboardPeriod,
    period_start: Option<NaiveDate>,
) -> Leaderboard {
    let current = standings
        .iter()
        .position(|standing| standing.user_id == current_user_id);

    let entries = standings
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, standing)| LeaderboardEntry {
            rank: index + 1,
            user: LeaderboardUser {
                id: standing.user_id.clone(),
                username: standing.username.clone(),
                first_name: standing.first_name.clone(),
            },
            xp: standing.xp,
            words_learned: standing.words_learned,
            is_current_user: standing.user_id == current_user_id,
        })
        .collect();

    Leaderboard {
        period,
        period_start,
        entries,
        current_user_rank: current.map(|index| index + 1),
        current_user_xp: current.map(|index| standings[index].xp).unwrap_or(0),
        total_participants: standings.len(),
    }
}

async fn cached_standings(
    state: &AppState,
    period: LeaderboardPeriod,
    today: NaiveDate,
) -> Result<Vec<XpStanding>, sqlx::Error> {
    let start = period.start(today);
    let key = leaderboard_key(
        period.as_str(),
        &start.map(|d| d.to_string()).unwrap_or_else(|| "all".to_string()),
    );

    if let Some(cache) = state.cache() {
        if let Some(cached) = cache.get::<Vec<XpStanding>>(&key).await {
            return Ok(cached);
        }
    }

    let standings = xp_standings(state.db().pool(), start).await?;
    if let Some(cache) = state.cache() {
        cache.set(&key, &standings, LEADERBOARD_TTL).await;
    }
    Ok(standings)
}

pub async fn leaderboard(
    state: &AppState,
    period: LeaderboardPeriod,
    current_user_id: &str,
    limit: usize,
    today: NaiveDate,
) -> Result<Leaderboard, sqlx::Error> {
    let standings = cached_standings(state, period, today).await?;
    Ok(rank_standings(
        &standings,
        current_user_id,
        limit.clamp(1, MAX_LIMIT),
        period,
        period.start(today),
    ))
}

/// Drops every cached board. Called after each commit that appends to the XP ledger.
pub async fn invalidate(state: &AppState) {
    if let Some(cache) = state.cache() {
        cache.delete_pattern(LEADERBOARD_PATTERN).await;
    }
}

/// Rewrites the stored snapshot of every period. Returns the number of rows written.
pub async fn snapshot_all(pool: &SqlitePool, today: NaiveDate) -> Result<usize, sqlx::Error> {
    let now = Utc::now();
    let mut written = 0;

    for period in LeaderboardPeriod::ALL {
        let standings = xp_standings(pool, period.start(today)).await?;
        replace_snapshot(
            pool,
            period.as_str(),
            period.snapshot_start(today),
            &standings,
            now,
        )
        .await?;
        written += standings.len();
    }

    Ok(written)
}
