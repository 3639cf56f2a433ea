pub mod achievements;
pub mod gamification;
pub mod leaderboard;
pub mod learning;
pub mod quiz;
