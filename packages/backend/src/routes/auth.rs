use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, AuthUser, AUTH_COOKIE_NAME};
use crate::db::operations::user::{self, NewUser, TamilLevel, UserRecord};
use crate::middleware::auth::authenticate;
use crate::response::{json_error, AppError, AppResult, SuccessResponse};
use crate::routes::parse_json;
use crate::routes::users::ProfileView;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;
const DEFAULT_DAILY_GOAL: u32 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/verify", get(verify))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    password_confirm: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    tamil_level: Option<String>,
    #[serde(default)]
    daily_word_goal: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    user: ProfileView,
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct VerifyData {
    user: AuthUser,
}

async fn register(State(state): State<AppState>, body: Bytes) -> AppResult {
    let payload: RegisterRequest = parse_json(&body)?;

    let username = payload.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::validation("Username is required (max 150 characters)"));
    }
    if !is_valid_email(&payload.email) {
        return Err(AppError::validation("Invalid email address"));
    }
    if payload.password != payload.password_confirm {
        return Err(AppError::validation("Passwords do not match"));
    }
    if let Some(message) = validate_register_password(&payload.password) {
        return Err(AppError::validation(message));
    }
    let tamil_level = match payload.tamil_level.as_deref() {
        None => TamilLevel::default(),
        Some(value) => TamilLevel::parse(value)
            .ok_or_else(|| AppError::validation("tamilLevel must be beginner, intermediate or advanced"))?,
    };
    let daily_word_goal = payload.daily_word_goal.unwrap_or(DEFAULT_DAILY_GOAL);
    if !(1..=100).contains(&daily_word_goal) {
        return Err(AppError::validation("dailyWordGoal must be between 1 and 100"));
    }

    let email = payload.email.trim().to_lowercase();
    let pool = state.db().pool();
    match user::identity_taken(pool, username, &email).await? {
        (true, _) => return Err(AppError::conflict("Username is already taken")),
        (_, true) => return Err(AppError::conflict("Email is already registered")),
        _ => {}
    }

    let password_hash = crate::auth::hash_password(&payload.password, state.auth().bcrypt_cost)
        .map_err(auth_failure)?;

    let record = user::insert_user(
        pool,
        &NewUser {
            username: username.to_string(),
            email,
            password_hash,
            first_name: payload.first_name.unwrap_or_default().trim().to_string(),
            last_name: payload.last_name.unwrap_or_default().trim().to_string(),
            tamil_level,
            daily_word_goal,
        },
    )
    .await?;

    tracing::info!(user_id = %record.id, "user registered");
    session_response(&state, StatusCode::CREATED, &record).await
}

async fn login(State(state): State<AppState>, body: Bytes) -> AppResult {
    let payload: LoginRequest = parse_json(&body)?;

    if !is_valid_email(&payload.email) {
        return Err(AppError::validation("Invalid email address"));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    let record = user::find_user_by_email(state.db().pool(), payload.email.trim()).await?;
    let Some(record) = record.filter(|r| crate::auth::verify_password(&payload.password, &r.password_hash))
    else {
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    session_response(&state, StatusCode::OK, &record).await
}

/// Rotates the presented token: the old session is revoked once the new one exists.
async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> AppResult {
    let (auth_user, old_token) = authenticate(&state, &headers).await?;

    let record = user::find_user_by_id(state.db().pool(), &auth_user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Authentication failed, please log in again"))?;

    let response = session_response(&state, StatusCode::OK, &record).await?;
    crate::auth::revoke_session(state.db(), &old_token)
        .await
        .map_err(auth_failure)?;
    Ok(response)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult {
    if let Some(token) = crate::auth::extract_token(&headers) {
        if let Err(err) = crate::auth::revoke_session(state.db(), &token).await {
            tracing::warn!(error = %err, "session revoke failed");
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Some(cookie) = clear_auth_cookie_header(&state) {
        response_headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((
        StatusCode::OK,
        response_headers,
        crate::response::message("Logged out"),
    )
        .into_response())
}

async fn verify(State(state): State<AppState>, headers: HeaderMap) -> AppResult {
    let (user, _) = authenticate(&state, &headers).await?;
    Ok(crate::response::ok(VerifyData { user }))
}

async fn session_response(
    state: &AppState,
    status: StatusCode,
    record: &UserRecord,
) -> Result<Response, AppError> {
    let (token, expires_at) = crate::auth::issue_session(state.db(), state.auth(), &record.id)
        .await
        .map_err(auth_failure)?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = auth_cookie_header(state, &token) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((
        status,
        headers,
        Json(SuccessResponse {
            success: true,
            data: AuthData {
                user: ProfileView::from_record(record),
                token,
                expires_at,
            },
        }),
    )
        .into_response())
}

fn auth_failure(err: AuthError) -> AppError {
    match err {
        AuthError::MissingSecret => AppError::service_unavailable("Authentication is not configured"),
        AuthError::Database(inner) => AppError::from(inner),
        other => {
            tracing::warn!(error = %other, "token issue failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                other.to_string(),
            )
        }
    }
}

fn is_production(state: &AppState) -> bool {
    state.config().app_env == "production"
}

fn auth_cookie_header(state: &AppState, token: &str) -> Option<HeaderValue> {
    let max_age = crate::auth::parse_expires_in_ms(&state.auth().jwt_expires_in)
        .map(|ms| ms / 1000)
        .unwrap_or(86400);

    let mut cookie = format!(
        "{AUTH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    );
    if is_production(state) {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).ok()
}

fn clear_auth_cookie_header(state: &AppState) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{AUTH_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0"
    );
    if is_production(state) {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).ok()
}

fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.contains(' ') {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    domain.contains('.')
}

fn validate_register_password(password: &str) -> Option<&'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 8 characters");
    }

    let has_letter = password.chars().any(|ch| ch.is_alphabetic());
    let has_digit = password.chars().any(|ch| ch.is_ascii_digit());

    if has_letter && has_digit {
        None
    } else {
        Some("Password must contain a letter and a digit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("kavya@example.com"));
        assert!(is_valid_email("  kavya@example.com "));
        assert!(!is_valid_email("kavya@localhost"));
        assert!(!is_valid_email("kavya example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("kavya"));
    }

    #[test]
    fn password_rules() {
        assert_eq!(
            validate_register_password("abc12"),
            Some("Password must be at least 8 characters")
        );
        assert_eq!(
            validate_register_password("abcdefgh"),
            Some("Password must contain a letter and a digit")
        );
        assert_eq!(
            validate_register_password("12345678"),
            Some("Password must contain a letter and a digit")
        );
        assert_eq!(validate_register_password("vanakkam1"), None);
    }
}
