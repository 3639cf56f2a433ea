use axum::body::Bytes;
use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::gamification::{earned_achievements, Achievement};
use crate::db::operations::progress::learning_totals;
use crate::db::operations::user::{self, ProfileUpdate, TamilLevel, UserRecord};
use crate::response::{ok, AppError, AppResult};
use crate::routes::{parse_json, today};
use crate::services::gamification::{round_tenth, user_stats};
use crate::state::AppState;

const UI_LANGUAGES: [&str; 2] = ["en", "ta"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(update_me))
        .route("/me/stats", get(get_stats))
        .route("/me/achievements", get(get_achievements))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tamil_level: TamilLevel,
    pub daily_word_goal: u32,
    pub ui_language: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            username: record.username.clone(),
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            tamil_level: record.tamil_level,
            daily_word_goal: record.daily_word_goal,
            ui_language: record.ui_language.clone(),
            current_streak: record.streak().visible_on(today()),
            longest_streak: record.longest_streak,
            last_activity_date: record.last_activity_date,
            created_at: record.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDetail {
    #[serde(flatten)]
    profile: ProfileView,
    words_learned_count: i64,
    words_mastered_count: i64,
    average_accuracy: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    tamil_level: Option<String>,
    daily_word_goal: Option<u32>,
    ui_language: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EarnedAchievement {
    #[serde(flatten)]
    achievement: Achievement,
    earned_at: DateTime<Utc>,
}

/// Loads the full record of the signed-in user.
pub(crate) async fn current_user(state: &AppState, auth: &AuthUser) -> Result<UserRecord, AppError> {
    user::find_user_by_id(state.db().pool(), &auth.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Authentication failed, please log in again"))
}

async fn profile_detail(state: &AppState, record: &UserRecord) -> Result<ProfileDetail, AppError> {
    let totals = learning_totals(state.db().pool(), &record.id).await?;
    Ok(ProfileDetail {
        profile: ProfileView::from_record(record),
        words_learned_count: totals.words_learned,
        words_mastered_count: totals.words_mastered,
        average_accuracy: round_tenth(totals.accuracy_percentage()),
    })
}

async fn get_me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult {
    let record = current_user(&state, &auth).await?;
    Ok(ok(profile_detail(&state, &record).await?))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Bytes,
) -> AppResult {
    let payload: UpdateProfileRequest = parse_json(&body)?;
    let update = validate_profile_update(payload)?;

    user::update_profile(state.db().pool(), &auth.id, &update).await?;
    let record = current_user(&state, &auth).await?;
    tracing::info!(user_id = %auth.id, "profile updated");
    Ok(ok(profile_detail(&state, &record).await?))
}

fn validate_profile_update(payload: UpdateProfileRequest) -> Result<ProfileUpdate, AppError> {
    let tamil_level = payload
        .tamil_level
        .as_deref()
        .map(|value| {
            TamilLevel::parse(value).ok_or_else(|| {
                AppError::validation("tamilLevel must be beginner, intermediate or advanced")
            })
        })
        .transpose()?;

    if let Some(goal) = payload.daily_word_goal {
        if !(1..=100).contains(&goal) {
            return Err(AppError::validation("dailyWordGoal must be between 1 and 100"));
        }
    }

    if let Some(language) = payload.ui_language.as_deref() {
        if !UI_LANGUAGES.contains(&language) {
            return Err(AppError::validation("uiLanguage must be en or ta"));
        }
    }

    Ok(ProfileUpdate {
        first_name: payload.first_name.map(|v| v.trim().to_string()),
        last_name: payload.last_name.map(|v| v.trim().to_string()),
        tamil_level,
        daily_word_goal: payload.daily_word_goal,
        ui_language: payload.ui_language,
    })
}

async fn get_stats(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> AppResult {
    let record = current_user(&state, &auth).await?;
    Ok(ok(user_stats(state.db().pool(), &record, today()).await?))
}

async fn get_achievements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult {
    let earned: Vec<EarnedAchievement> = earned_achievements(state.db().pool(), &auth.id)
        .await?
        .into_iter()
        .map(|(achievement, earned_at)| EarnedAchievement {
            achievement,
            earned_at,
        })
        .collect();
    Ok(ok(earned))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UpdateProfileRequest {
        UpdateProfileRequest {
            first_name: None,
            last_name: None,
            tamil_level: None,
            daily_word_goal: None,
            ui_language: None,
        }
    }

    #[test]
    fn goal_outside_range_rejected() {
        for goal in [0, 101] {
            let err = validate_profile_update(UpdateProfileRequest {
                daily_word_goal: Some(goal),
                ..request()
            })
            .unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
        }
    }

    #[test]
    fn unknown_language_and_level_rejected() {
        assert!(validate_profile_update(UpdateProfileRequest {
            ui_language: Some("fr".into()),
            ..request()
        })
        .is_err());
        assert!(validate_profile_update(UpdateProfileRequest {
            tamil_level: Some("expert".into()),
            ..request()
        })
        .is_err());
    }

    #[test]
    fn valid_update_is_trimmed() {
        let update = validate_profile_update(UpdateProfileRequest {
            first_name: Some("  Kavya ".into()),
            tamil_level: Some("advanced".into()),
            daily_word_goal: Some(25),
            ui_language: Some("ta".into()),
            ..request()
        })
        .unwrap();
        assert_eq!(update.first_name.as_deref(), Some("Kavya"));
        assert_eq!(update.tamil_level, Some(TamilLevel::Advanced));
        assert_eq!(update.daily_word_goal, Some(25));
    }
}
