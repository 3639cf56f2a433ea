//! XP and streak rules
//!
//! XP is awarded in two places: per answered question ([`answer_xp`]) and
//! once when a quiz session is completed ([`completion_bonus`]). Together
//! they add up to `correct * 10 + accuracy bonus + speed bonus`.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::sanitize;

pub const XP_PER_CORRECT_ANSWER: u32 = 10;

/// 5 XP per full 10% of session accuracy
pub const ACCURACY_BONUS_STEP: u32 = 5;

/// Speed bonus is `SPEED_BONUS_CAP - minutes`, floored at zero
pub const SPEED_BONUS_CAP: f64 = 50.0;

pub fn answer_xp(correct: bool) -> u32 {
    if correct {
        XP_PER_CORRECT_ANSWER
    } else {
        0
    }
}

pub fn accuracy_percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    sanitize::clamp_percentage(f64::from(correct) / f64::from(total) * 100.0)
}

/// Session duration in minutes, rounded to one decimal.
pub fn duration_minutes(duration_seconds: u32) -> f64 {
    (f64::from(duration_seconds) / 60.0 * 10.0).round() / 10.0
}

/// Bonus XP granted when a session is completed.
pub fn completion_bonus(correct: u32, total: u32, duration_seconds: u32) -> u32 {
    // whole tenths of accuracy, in integers so 70% is never 69.99..
    let tenths = if total == 0 {
        0
    } else {
        u64::from(correct.min(total)) * 10 / u64::from(total)
    };
    let accuracy_bonus = tenths as u32 * ACCURACY_BONUS_STEP;

    let minutes = duration_minutes(duration_seconds);
    let speed_bonus = if minutes > 0.0 {
        (SPEED_BONUS_CAP - minutes).max(0.0) as u32
    } else {
        0
    };

    accuracy_bonus + speed_bonus
}

/// Daily activity streak of one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub current: u32,
    pub longest: u32,
    pub last_activity_date: Option<NaiveDate>,
}

impl StreakState {
    /// Registers activity on `today`. Returns `true` when the state changed.
    pub fn record_activity(&mut self, today: NaiveDate) -> bool {
        match self.last_activity_date {
            Some(last) if last == today => return false,
            // activity dated before the last one (clock skew) leaves the streak alone
            Some(last) if last > today => return false,
            Some(last) if last + Duration::days(1) == today => {
                self.current = self.current.saturating_add(1);
            }
            _ => {
                self.current = 1;
            }
        }

        self.longest = self.longest.max(self.current);
        self.last_activity_date = Some(today);
        true
    }

    /// Streak as displayed on `today`: zero once a full day was missed.
    pub fn visible_on(&self, today: NaiveDate) -> u32 {
        match self.last_activity_date {
            Some(last) if today - last <= Duration::days(1) => self.current,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    #[test]
    fn answer_xp_rewards_correct_only() {
        assert_eq!(answer_xp(true), 10);
        assert_eq!(answer_xp(false), 0);
    }

    #[test]
    fn completion_bonus_combines_accuracy_and_speed() {
        // 8/10 -> 80% -> 40 XP; 5 minutes -> 45 XP
        assert_eq!(completion_bonus(8, 10, 300), 85);
        // 3/10 -> 30% -> 15 XP; 60 minutes -> no speed bonus
        assert_eq!(completion_bonus(3, 10, 3600), 15);
        // zero duration gives no speed bonus
        assert_eq!(completion_bonus(10, 10, 0), 50);
        assert_eq!(completion_bonus(0, 0, 0), 0);
    }

    #[test]
    fn speed_bonus_truncates_fractional_minutes() {
        // 90 s -> 1.5 min -> 48.5 -> 48
        assert_eq!(completion_bonus(0, 1, 90), 48);
    }

    #[test]
    fn streak_first_activity_starts_at_one() {
        let mut streak = StreakState::default();
        assert!(streak.record_activity(d(1)));
        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 1);
    }

    #[test]
    fn streak_same_day_is_noop() {
        let mut streak = StreakState::default();
        streak.record_activity(d(1));
        assert!(!streak.record_activity(d(1)));
        assert_eq!(streak.current, 1);
    }

    #[test]
    fn streak_consecutive_days_accumulate_and_gaps_reset() {
        let mut streak = StreakState::default();
        streak.record_activity(d(1));
        streak.record_activity(d(2));
        streak.record_activity(d(3));
        assert_eq!(streak.current, 3);

        streak.record_activity(d(6));
        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 3);
    }

    #[test]
    fn visible_streak_expires_after_missed_day() {
        let mut streak = StreakState::default();
        streak.record_activity(d(1));
        streak.record_activity(d(2));
        assert_eq!(streak.visible_on(d(3)), 2);
        assert_eq!(streak.visible_on(d(4)), 0);
    }
}
