mod auth;
mod gamification;
mod health;
mod progress;
mod quizzes;
mod users;
mod words;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;

use crate::middleware::auth::require_auth;
use crate::middleware::rate_limit::auth_rate_limit_middleware;
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/api/users", users::router())
        .nest("/api/words", words::router())
        .nest("/api/quizzes", quizzes::router())
        .nest("/api/progress", progress::router())
        .nest("/api/gamification", gamification::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/health", health::router())
        .nest("/api/auth", auth::router())
        .merge(protected)
        .fallback(fallback_handler)
        .layer(middleware::from_fn(auth_rate_limit_middleware))
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found").into_response()
}

/// Calendar day used for scheduling and the XP ledger (UTC).
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Decodes a JSON body, mapping malformed input to a validation error.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "rejected request body");
        AppError::validation("Invalid request body")
    })
}
