use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{AuthError, AuthUser};
use crate::response::AppError;
use crate::state::AppState;

/// Resolves the bearer token or `auth_token` cookie into the signed-in user.
/// Returns the raw token alongside so callers can revoke it.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(AuthUser, String), AppError> {
    let Some(token) = crate::auth::extract_token(headers) else {
        return Err(AppError::unauthorized("Authentication token not provided"));
    };

    match crate::auth::verify_request_token(state.db(), state.auth(), &token).await {
        Ok(user) => Ok((user, token)),
        Err(AuthError::MissingSecret) => {
            Err(AppError::service_unavailable("Authentication is not configured"))
        }
        Err(AuthError::Database(err)) => {
            tracing::warn!(error = %err, "token verification query failed");
            Err(AppError::internal(err.to_string()))
        }
        Err(_) => Err(AppError::unauthorized(
            "Authentication failed, please log in again",
        )),
    }
}

/// Rejects unauthenticated requests and stores the [`AuthUser`] in the
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok((user, _)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}
