use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Router};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::response::{ok, AppError, AppResult};
use crate::routes::today;
use crate::routes::users::current_user;
use crate::services::gamification::dashboard;
use crate::services::leaderboard::{self, LeaderboardPeriod, DEFAULT_LIMIT, MAX_LIMIT};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/leaderboard", get(get_leaderboard))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    #[serde(rename = "type")]
    period: Option<String>,
    limit: Option<String>,
}

async fn get_dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult {
    let record = current_user(&state, &auth).await?;
    Ok(ok(dashboard(state.db().pool(), &record, today()).await?))
}

fn parse_leaderboard_query(query: &LeaderboardQuery) -> Result<(LeaderboardPeriod, usize), AppError> {
    let period = match query.period.as_deref() {
        None => LeaderboardPeriod::default(),
        Some(value) => LeaderboardPeriod::parse(value).ok_or_else(|| {
            AppError::validation("type must be daily, weekly, monthly or all_time")
        })?,
    };

    let limit = match query.limit.as_deref() {
        None => DEFAULT_LIMIT,
        Some(value) => match value.trim().parse::<usize>() {
            Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
            _ => return Err(AppError::validation("limit must be between 1 and 100")),
        },
    };

    Ok((period, limit))
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult {
    let (period, limit) = parse_leaderboard_query(&query)?;
    let board = leaderboard::leaderboard(&state, period, &auth.id, limit, today()).await?;
    Ok(ok(board))
}
