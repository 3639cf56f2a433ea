use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};

use crate::auth::AuthUser;
use crate::response::{ok, AppResult};
use crate::routes::today;
use crate::services::achievements;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/achievements", get(list_achievements))
        .route("/achievements/progress", get(achievement_progress))
}

async fn list_achievements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult {
    Ok(ok(achievements::achievements_for_user(&state, &auth.id).await?))
}

async fn achievement_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult {
    Ok(ok(achievements::progress_for_user(&state, &auth.id, today()).await?))
}
