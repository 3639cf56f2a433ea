use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::progress::mark_learned;
use crate::db::operations::word::{self, Word, WordList};
use crate::response::{created, message, ok, AppError, AppResult};
use crate::routes::users::current_user;
use crate::routes::{parse_json, today};
use crate::services::learning::{self, ProgressView, MAX_DAILY_LIMIT};
use crate::state::AppState;

const SEARCH_LIMIT: i64 = 20;
const MAX_LIST_NAME_LEN: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/daily", get(daily))
        .route("/review", get(review))
        .route("/weak", get(weak))
        .route("/search", get(search))
        .route("/lists", get(list_lists).post(create_list))
        .route(
            "/lists/:id",
            get(get_list).put(update_list).delete(delete_list),
        )
        .route("/lists/:id/words", post(add_list_word))
        .route("/lists/:id/words/:word_id", delete(remove_list_word))
        .route("/:id", get(word_detail))
        .route("/:id/mark-learned", post(mark_word_learned))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateListRequest {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_public: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateListRequest {
    name: Option<String>,
    description: Option<String>,
    is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListWordRequest {
    word_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListDetail {
    #[serde(flatten)]
    list: WordList,
    words: Vec<Word>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkLearnedData {
    word_id: String,
    progress: ProgressView,
}

fn parse_daily_limit(raw: Option<&str>, default_goal: u32) -> Result<usize, AppError> {
    let Some(raw) = raw else {
        return Ok((default_goal as usize).clamp(1, MAX_DAILY_LIMIT));
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=MAX_DAILY_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(AppError::validation("limit must be between 1 and 50")),
    }
}

async fn daily(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<DailyQuery>,
) -> AppResult {
    let record = current_user(&state, &auth).await?;
    let limit = parse_daily_limit(query.limit.as_deref(), record.daily_word_goal)?;
    let words = learning::daily_words(state.db().pool(), &record, limit, today()).await?;
    Ok(ok(words))
}

async fn review(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult {
    Ok(ok(learning::review_words(state.db().pool(), &auth.id, today()).await?))
}

async fn weak(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult {
    Ok(ok(learning::weak_words(state.db().pool(), &auth.id, today()).await?))
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> AppResult {
    let q = query.q.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let category = query.category.as_deref().map(str::trim).filter(|v| !v.is_empty());
    Ok(ok(word::search_words(state.db().pool(), q, category, SEARCH_LIMIT).await?))
}

async fn word_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    learning::word_detail(state.db().pool(), &auth.id, &id, today())
        .await?
        .map(ok)
        .ok_or_else(|| AppError::not_found("Word not found"))
}

async fn mark_word_learned(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    let pool = state.db().pool();
    if word::find_word(pool, &id).await?.is_none() {
        return Err(AppError::not_found("Word not found"));
    }

    let today = today();
    let record = {
        let _guard = state.user_locks().acquire(&auth.id).await;
        mark_learned(pool, &auth.id, &id, today).await?
    };

    tracing::debug!(user_id = %auth.id, word_id = %id, "word marked learned");
    Ok(ok(MarkLearnedData {
        progress: ProgressView::from_record(&record, today),
        word_id: id,
    }))
}

// ==================== Word lists ====================

/// A list the caller may read: their own or a public one. Private lists of
/// other users are reported as missing.
async fn readable_list(state: &AppState, user_id: &str, list_id: &str) -> Result<WordList, AppError> {
    match word::find_word_list(state.db().pool(), list_id).await? {
        Some(list) if list.user_id == user_id || list.is_public => Ok(list),
        _ => Err(AppError::not_found("Word list not found")),
    }
}

async fn owned_list(state: &AppState, user_id: &str, list_id: &str) -> Result<WordList, AppError> {
    let list = readable_list(state, user_id, list_id).await?;
    if list.user_id != user_id {
        return Err(AppError::forbidden("Only the owner can modify this word list"));
    }
    Ok(list)
}

fn validate_list_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_LIST_NAME_LEN {
        return Err(AppError::validation("name is required (max 100 characters)"));
    }
    Ok(name)
}

async fn list_lists(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult {
    Ok(ok(word::visible_word_lists(state.db().pool(), &auth.id).await?))
}

async fn create_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> AppResult {
    let payload: CreateListRequest = parse_json(&body)?;
    let name = validate_list_name(&payload.name)?;

    let list = word::insert_word_list(
        state.db().pool(),
        &auth.id,
        name,
        payload.description.trim(),
        payload.is_public,
    )
    .await?;
    Ok(created(list))
}

async fn get_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    let list = readable_list(&state, &auth.id, &id).await?;
    let words = word::words_in_list(state.db().pool(), &list.id).await?;
    Ok(ok(ListDetail { list, words }))
}

async fn update_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult {
    let payload: UpdateListRequest = parse_json(&body)?;
    let list = owned_list(&state, &auth.id, &id).await?;
    let name = payload.name.as_deref().map(validate_list_name).transpose()?;

    let pool = state.db().pool();
    word::update_word_list(
        pool,
        &list.id,
        name,
        payload.description.as_deref().map(str::trim),
        payload.is_public,
    )
    .await?;

    word::find_word_list(pool, &list.id)
        .await?
        .map(ok)
        .ok_or_else(|| AppError::not_found("Word list not found"))
}

async fn delete_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> AppResult {
    let list = owned_list(&state, &auth.id, &id).await?;
    word::delete_word_list(state.db().pool(), &list.id).await?;
    Ok(message("Word list deleted"))
}

async fn add_list_word(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult {
    let payload: ListWordRequest = parse_json(&body)?;
    let list = owned_list(&state, &auth.id, &id).await?;

    let pool = state.db().pool();
    if word::find_word(pool, &payload.word_id).await?.is_none() {
        return Err(AppError::not_found("Word not found"));
    }
    if !word::add_word_to_list(pool, &list.id, &payload.word_id).await? {
        return Err(AppError::conflict("Word is already on this list"));
    }
    Ok(message("Word added to list"))
}

async fn remove_list_word(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, word_id)): Path<(String, String)>,
) -> AppResult {
    let list = owned_list(&state, &auth.id, &id).await?;
    if !word::remove_word_from_list(state.db().pool(), &list.id, &word_id).await? {
        return Err(AppError::not_found("Word is not on this list"));
    }
    Ok(message("Word removed from list"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_limit_defaults_to_goal() {
        assert_eq!(parse_daily_limit(None, 10).unwrap(), 10);
        assert_eq!(parse_daily_limit(None, 80).unwrap(), MAX_DAILY_LIMIT);
        assert_eq!(parse_daily_limit(Some("5"), 10).unwrap(), 5);
    }

    #[test]
    fn daily_limit_rejects_out_of_range() {
        assert!(parse_daily_limit(Some("0"), 10).is_err());
        assert!(parse_daily_limit(Some("51"), 10).is_err());
        assert!(parse_daily_limit(Some("ten"), 10).is_err());
    }

    #[test]
    fn list_name_is_trimmed_and_bounded() {
        assert_eq!(validate_list_name("  Greetings ").unwrap(), "Greetings");
        assert!(validate_list_name("   ").is_err());
        assert!(validate_list_name(&"a".repeat(101)).is_err());
    }
}
