use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::Config;
use crate::db::operations::user;
use crate::db::Database;

pub const AUTH_COOKIE_NAME: &str = "auth_token";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Token signing settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_expires_in: String,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            jwt_expires_in: config.jwt_expires_in.clone(),
            bcrypt_cost: if config.is_test() {
                4
            } else {
                bcrypt::DEFAULT_COST
            },
        }
    }

    pub fn secret(&self) -> Result<&str, AuthError> {
        self.jwt_secret.as_deref().ok_or(AuthError::MissingSecret)
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Verifies signature and expiry, then checks the stored session and loads the user.
pub async fn verify_request_token(
    db: &Database,
    config: &AuthConfig,
    token: &str,
) -> Result<AuthUser, AuthError> {
    let claims = verify_jwt_hs256(token, config.secret()?)?;

    let Some((session_user_id, expires_at)) = user::find_session(db.pool(), &hash_token(token)).await?
    else {
        return Err(AuthError::InvalidToken);
    };

    if session_user_id != claims.user_id || expires_at < Utc::now() {
        return Err(AuthError::InvalidToken);
    }

    let record = user::find_user_by_id(db.pool(), &claims.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        id: record.id,
        email: record.email,
        username: record.username,
    })
}

/// Signs a token, stores its hash as a session and returns `(token, expiresAt)`.
pub async fn issue_session(
    db: &Database,
    config: &AuthConfig,
    user_id: &str,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let (token, expires_at) = sign_jwt_for_user(user_id, config.secret()?, &config.jwt_expires_in)?;
    user::insert_session(db.pool(), user_id, &hash_token(&token), expires_at).await?;
    Ok((token, expires_at))
}

pub async fn revoke_session(db: &Database, token: &str) -> Result<(), AuthError> {
    user::delete_session(db.pool(), &hash_token(token)).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct JwtClaims {
    pub user_id: String,
    pub expires_at: i64,
}

pub fn verify_jwt_hs256(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    if header_json.get("alg").and_then(|value| value.as_str()) != Some("HS256") {
        return Err(AuthError::InvalidToken);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;

    let expires_at = payload
        .get("exp")
        .and_then(|value| value.as_i64())
        .ok_or(AuthError::InvalidToken)?;
    if Utc::now().timestamp() >= expires_at {
        return Err(AuthError::InvalidToken);
    }

    let user_id = payload
        .get("userId")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?
        .to_string();

    Ok(JwtClaims {
        user_id,
        expires_at,
    })
}

pub fn sign_jwt_for_user(
    user_id: &str,
    secret: &str,
    expires_in: &str,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let expires_in_ms = parse_expires_in_ms(expires_in)?;

    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });

    // jti keeps tokens issued within the same second distinct
    let payload_json = serde_json::json!({
        "userId": user_id,
        "jti": uuid::Uuid::new_v4().to_string(),
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header_json.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.to_string());
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{signing_input}.{sig_b64}"), exp))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 || !trimmed.is_ascii() {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let unit_ms = match unit {
        "s" => 1000,
        "m" => 60 * 1000,
        "h" => 60 * 60 * 1000,
        "d" => 24 * 60 * 60 * 1000,
        _ => return Err(AuthError::InvalidExpiresIn),
    };
    amount
        .checked_mul(unit_ms)
        .ok_or(AuthError::InvalidExpiresIn)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    #[test]
    fn signed_token_verifies() {
        let (token, _) = sign_jwt_for_user("user-1", SECRET, "1h").unwrap();
        let claims = verify_jwt_hs256(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, "user-1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = sign_jwt_for_user("user-1", SECRET, "1h").unwrap();
        assert!(matches!(
            verify_jwt_hs256(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (token, _) = sign_jwt_for_user("user-1", SECRET, "1h").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"userId":"admin","exp":9999999999}"#);
        parts[1] = &forged;
        assert!(verify_jwt_hs256(&parts.join("."), SECRET).is_err());
    }

    #[test]
    fn tokens_issued_together_differ() {
        let (a, _) = sign_jwt_for_user("user-1", SECRET, "1h").unwrap();
        let (b, _) = sign_jwt_for_user("user-1", SECRET, "1h").unwrap();
        assert_ne!(a, b);
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn expires_in_units() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("15m").unwrap(), 900_000);
        assert_eq!(parse_expires_in_ms("24h").unwrap(), 86_400_000);
        assert_eq!(parse_expires_in_ms("7d").unwrap(), 604_800_000);
        assert!(parse_expires_in_ms("0h").is_err());
        assert!(parse_expires_in_ms("h").is_err());
        assert!(parse_expires_in_ms("10w").is_err());
    }

    #[test]
    fn token_is_read_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=xyz"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("secret123", 4).unwrap();
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("secret124", &hash));
    }
}
