use std::time::Duration;

pub const LEADERBOARD_TTL: Duration = Duration::from_secs(60);
pub const ACHIEVEMENT_CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

pub const ACHIEVEMENT_CATALOG_KEY: &str = "achievements:catalog";
pub const LEADERBOARD_PATTERN: &str = "leaderboard:*";

pub fn leaderboard_key(period: &str, period_start: &str) -> String {
    format!("leaderboard:{}:{}", period, period_start)
}
