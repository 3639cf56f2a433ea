use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::cache::keys::{ACHIEVEMENT_CATALOG_KEY, ACHIEVEMENT_CATALOG_TTL};
use crate::db::operations::gamification::{
    append_xp, award_achievement, earned_achievement_ids, earned_achievements, list_achievements,
    total_xp, Achievement, CriteriaType, XpSource,
};
use crate::db::operations::progress::{learning_totals, mastered_in_category};
use crate::db::operations::quiz::count_completed_sessions;
use crate::db::operations::user::find_user_by_id;
use crate::state::AppState;

/// Counters the achievement criteria are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserMetrics {
    pub words_learned: i64,
    pub words_mastered: i64,
    pub current_streak: i64,
    pub total_xp: i64,
    pub accuracy: f64,
    pub quiz_sessions: i64,
}

pub async fn collect_metrics(
    conn: &mut SqliteConnection,
    user_id: &str,
    today: NaiveDate,
) -> Result<UserMetrics, sqlx::Error> {
    let totals = learning_totals(&mut *conn, user_id).await?;
    let current_streak = find_user_by_id(&mut *conn, user_id)
        .await?
        .map(|user| user.streak().visible_on(today))
        .unwrap_or(0);
    let total_xp = total_xp(&mut *conn, user_id).await?;
    let quiz_sessions = count_completed_sessions(&mut *conn, user_id).await?;

    Ok(UserMetrics {
        words_learned: totals.words_learned,
        words_mastered: totals.words_mastered,
        current_streak: i64::from(current_streak),
        total_xp,
        accuracy: totals.accuracy_percentage(),
        quiz_sessions,
    })
}

/// Value of the achievement's criterion for this user. `category_mastered`
/// is only read for category mastery achievements.
pub fn current_value(achievement: &Achievement, metrics: &UserMetrics, category_mastered: i64) -> i64 {
    match achievement.criteria_type {
        CriteriaType::WordsLearned => metrics.words_learned,
        CriteriaType::WordsMastered => metrics.words_mastered,
        CriteriaType::Streak => metrics.current_streak,
        CriteriaType::Xp => metrics.total_xp,
        CriteriaType::Accuracy => metrics.accuracy.floor() as i64,
        CriteriaType::QuizSessions => metrics.quiz_sessions,
        CriteriaType::CategoryMastery => category_mastered,
        // no response-speed signal is tracked
        CriteriaType::Speed => 0,
    }
}

pub fn is_met(achievement: &Achievement, value: i64) -> bool {
    achievement.criteria_type != CriteriaType::Speed && value >= achievement.criteria_value
}

pub fn progress_percentage(value: i64, target: i64) -> f64 {
    if target <= 0 {
        return 100.0;
    }
    let percentage = (value.max(0) as f64 / target as f64 * 100.0).min(100.0);
    (percentage * 10.0).round() / 10.0
}

async fn category_value(
    conn: &mut SqliteConnection,
    user_id: &str,
    achievement: &Achievement,
) -> Result<i64, sqlx::Error> {
    match (achievement.criteria_type, achievement.criteria_category()) {
        (CriteriaType::CategoryMastery, Some(category)) => {
            mastered_in_category(&mut *conn, user_id, category).await
        }
        _ => Ok(0),
    }
}

/// Awards every unearned achievement whose criterion is now met and books
/// its XP reward. Runs on the caller's connection so it joins the caller's
/// transaction.
pub async fn check_and_award(
    conn: &mut SqliteConnection,
    user_id: &str,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<Achievement>, sqlx::Error> {
    let earned = earned_achievement_ids(&mut *conn, user_id).await?;
    let pending: Vec<Achievement> = list_achievements(&mut *conn)
        .await?
        .into_iter()
        .filter(|achievement| !earned.contains(&achievement.id))
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let metrics = collect_metrics(&mut *conn, user_id, today).await?;
    let mut awarded = Vec::new();

    for achievement in pending {
        let category_mastered = category_value(&mut *conn, user_id, &achievement).await?;
        let value = current_value(&achievement, &metrics, category_mastered);
        if !is_met(&achievement, value) {
            continue;
        }

        if award_achievement(&mut *conn, user_id, &achievement.id, now).await? {
            append_xp(
                &mut *conn,
                user_id,
                achievement.xp_reward,
                XpSource::Achievement,
                &achievement.id,
                today,
            )
            .await?;
            tracing::info!(user_id, achievement = %achievement.name, "achievement earned");
            awarded.push(achievement);
        }
    }

    Ok(awarded)
}

/// Full catalog, served from the cache when one is configured.
pub async fn catalog(state: &AppState) -> Result<Vec<Achievement>, sqlx::Error> {
    if let Some(cache) = state.cache() {
        if let Some(cached) = cache.get::<Vec<Achievement>>(ACHIEVEMENT_CATALOG_KEY).await {
            return Ok(cached);
        }
    }

    let achievements = list_achievements(state.db().pool()).await?;
    if let Some(cache) = state.cache() {
        cache
            .set(ACHIEVEMENT_CATALOG_KEY, &achievements, ACHIEVEMENT_CATALOG_TTL)
            .await;
    }
    Ok(achievements)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub is_earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Catalog as seen by one user; hidden achievements appear only once earned.
pub async fn achievements_for_user(
    state: &AppState,
    user_id: &str,
) -> Result<Vec<AchievementView>, sqlx::Error> {
    let catalog = catalog(state).await?;
    let earned = earned_achievements(state.db().pool(), user_id).await?;

    Ok(catalog
        .into_iter()
        .filter_map(|achievement| {
            let earned_at = earned
                .iter()
                .find(|(held, _)| held.id == achievement.id)
                .map(|(_, at)| *at);
            if achievement.is_hidden && earned_at.is_none() {
                return None;
            }
            Some(AchievementView {
                achievement,
                is_earned: earned_at.is_some(),
                earned_at,
            })
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub achievement: Achievement,
    pub current_value: i64,
    pub target_value: i64,
    pub progress_percentage: f64,
}

/// Progress towards every unearned, visible achievement, closest first.
pub async fn progress_for_user(
    state: &AppState,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<AchievementProgress>, sqlx::Error> {
    let pool: &SqlitePool = state.db().pool();
    let catalog = catalog(state).await?;
    let earned = earned_achievement_ids(pool, user_id).await?;

    let mut conn = pool.acquire().await?;
    let metrics = collect_metrics(&mut conn, user_id, today).await?;

    let mut progress = Vec::new();
    for achievement in catalog {
        if achievement.is_hidden || earned.contains(&achievement.id) {
            continue;
        }
        let category_mastered = category_value(&mut conn, user_id, &achievement).await?;
        let value = current_value(&achievement, &metrics, category_mastered);
        progress.push(AchievementProgress {
            current_value: value,
            target_value: achievement.criteria_value,
            progress_percentage: progress_percentage(value, achievement.criteria_value),
            achievement,
        });
    }

    progress.sort_by(|a, b| b.progress_percentage.total_cmp(&a.progress_percentage));
    Ok(progress)
}
