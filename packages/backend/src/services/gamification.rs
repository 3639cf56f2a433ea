use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use vocabtamil_algo::StreakState;

use crate::db::operations::gamification::{earned_achievement_ids, xp_since};
use crate::db::operations::progress::{learned_since, learning_totals};
use crate::db::operations::quiz::session_totals_since;
use crate::db::operations::user::{find_user_by_id, save_streak, UserRecord};
use crate::services::learning::{self, CategoryProgress, MasteryBreakdown};

/// Days covered by the dashboard's weekly block, today included
pub const WEEK_DAYS: i64 = 7;

/// Records learning activity for `today` on the user's streak.
pub async fn record_activity(
    conn: &mut SqliteConnection,
    user_id: &str,
    today: NaiveDate,
) -> Result<StreakState, sqlx::Error> {
    let Some(user) = find_user_by_id(&mut *conn, user_id).await? else {
        return Ok(StreakState::default());
    };

    let mut streak = user.streak();
    if streak.record_activity(today) {
        save_streak(&mut *conn, user_id, &streak).await?;
    }
    Ok(streak)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_xp: i64,
    pub xp_today: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub words_learned: i64,
    pub words_mastered: i64,
    pub average_accuracy: f64,
    pub quiz_sessions_completed: i64,
    pub total_study_time_seconds: i64,
    pub achievements_earned: usize,
}

pub async fn user_stats(
    pool: &SqlitePool,
    user: &UserRecord,
    today: NaiveDate,
) -> Result<UserStats, sqlx::Error> {
    let totals = learning_totals(pool, &user.id).await?;
    let sessions = session_totals_since(pool, &user.id, None).await?;
    let streak = user.streak();

    Ok(UserStats {
        total_xp: xp_since(pool, &user.id, None).await?,
        xp_today: xp_since(pool, &user.id, Some(today)).await?,
        current_streak: streak.visible_on(today),
        longest_streak: streak.longest,
        words_learned: totals.words_learned,
        words_mastered: totals.words_mastered,
        average_accuracy: round_tenth(totals.accuracy_percentage()),
        quiz_sessions_completed: sessions.completed_sessions,
        total_study_time_seconds: sessions.total_time_seconds,
        achievements_earned: earned_achievement_ids(pool, &user.id).await?.len(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyProgress {
    pub words_learned_today: i64,
    pub daily_goal: u32,
    pub progress_percentage: f64,
    pub streak_count: u32,
    pub xp_earned_today: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub words_learned: i64,
    pub quiz_sessions: i64,
    pub total_xp: i64,
    pub total_time_seconds: i64,
    pub average_accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub daily_progress: DailyProgress,
    pub weekly_stats: WeeklyStats,
    pub mastery_breakdown: MasteryBreakdown,
    pub category_progress: Vec<CategoryProgress>,
}

pub fn goal_percentage(learned_today: i64, daily_goal: u32) -> f64 {
    if daily_goal == 0 {
        return 0.0;
    }
    round_tenth((learned_today.max(0) as f64 / f64::from(daily_goal) * 100.0).min(100.0))
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub async fn dashboard(
    pool: &SqlitePool,
    user: &UserRecord,
    today: NaiveDate,
) -> Result<Dashboard, sqlx::Error> {
    let week_start = today - Duration::days(WEEK_DAYS - 1);
    let week_start_at = week_start.and_time(NaiveTime::MIN).and_utc();

    let learned_today = learned_since(pool, &user.id, today).await?;
    let xp_today = xp_since(pool, &user.id, Some(today)).await?;
    let week_sessions = session_totals_since(pool, &user.id, Some(week_start_at)).await?;
    let totals = learning_totals(pool, &user.id).await?;

    Ok(Dashboard {
        daily_progress: DailyProgress {
            words_learned_today: learned_today,
            daily_goal: user.daily_word_goal,
            progress_percentage: goal_percentage(learned_today, user.daily_word_goal),
            streak_count: user.streak().visible_on(today),
            xp_earned_today: xp_today,
        },
        weekly_stats: WeeklyStats {
            words_learned: learned_since(pool, &user.id, week_start).await?,
            quiz_sessions: week_sessions.completed_sessions,
            total_xp: xp_since(pool, &user.id, Some(week_start)).await?,
            total_time_seconds: week_sessions.total_time_seconds,
            average_accuracy: round_tenth(totals.accuracy_percentage()),
        },
        mastery_breakdown: learning::mastery_breakdown(pool, &user.id).await?,
        category_progress: learning::category_progress(pool, &user.id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_percentage_is_capped() {
        assert_eq!(goal_percentage(5, 10), 50.0);
        assert_eq!(goal_percentage(15, 10), 100.0);
        assert_eq!(goal_percentage(1, 3), 33.3);
        assert_eq!(goal_percentage(3, 0), 0.0);
    }
}
