//! Common Types and Constants
//!
//! Shared data structures used by the updater and the backend.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Ease factor assigned to a word on first exposure
pub const DEFAULT_EASE_FACTOR: f64 = 2.50;

/// Lower bound for the ease factor
pub const MIN_EASE_FACTOR: f64 = 1.30;

/// Ease factor increase after a correct answer
pub const EASE_BONUS: f64 = 0.10;

/// Ease factor decrease after an incorrect answer
pub const EASE_PENALTY: f64 = 0.20;

/// Review interval assigned on first exposure and after a lapse
pub const INITIAL_INTERVAL_DAYS: u32 = 1;

/// Upper bound for the review interval (100 years)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

// ==================== Mastery ====================

/// Four-level classification of how well a learner knows a word.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    #[default]
    New = 0,
    Learning = 1,
    Familiar = 2,
    Mastered = 3,
}

impl MasteryLevel {
    pub const ALL: [MasteryLevel; 4] = [
        MasteryLevel::New,
        MasteryLevel::Learning,
        MasteryLevel::Familiar,
        MasteryLevel::Mastered,
    ];

    pub fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::New),
            1 => Some(Self::Learning),
            2 => Some(Self::Familiar),
            3 => Some(Self::Mastered),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Familiar => "familiar",
            Self::Mastered => "mastered",
        }
    }

    /// Review interval (days) a word must reach to be classified at this level.
    pub fn threshold_days(self) -> u32 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Familiar => 6,
            Self::Mastered => 14,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() - 1)
    }

    /// One step up, saturating at `Mastered`.
    pub fn promote(self) -> Self {
        self.next().unwrap_or(self)
    }

    /// One step down, saturating at `New`.
    pub fn demote(self) -> Self {
        self.previous().unwrap_or(self)
    }

    pub fn is_learned(self) -> bool {
        self >= Self::Learning
    }
}

// ==================== Progress ====================

/// Spaced-repetition state of one user-word pair.
///
/// `times_seen == times_correct + times_incorrect` holds for every record
/// produced by [`crate::srs::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub mastery_level: MasteryLevel,
    pub times_seen: u32,
    pub times_correct: u32,
    pub times_incorrect: u32,
    pub next_review_date: NaiveDate,
    pub review_interval_days: u32,
    pub ease_factor: f64,
    /// Running average `(avg + t) / 2`, seconds
    pub average_response_time: Option<f64>,
    pub last_response_time: Option<f64>,
}

impl WordProgress {
    /// Default state on first exposure, due immediately.
    pub fn new_for(today: NaiveDate) -> Self {
        Self {
            mastery_level: MasteryLevel::New,
            times_seen: 0,
            times_correct: 0,
            times_incorrect: 0,
            next_review_date: today,
            review_interval_days: INITIAL_INTERVAL_DAYS,
            ease_factor: DEFAULT_EASE_FACTOR,
            average_response_time: None,
            last_response_time: None,
        }
    }

    pub fn accuracy_percentage(&self) -> f64 {
        crate::gamification::accuracy_percentage(self.times_correct, self.times_seen)
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        today >= self.next_review_date
    }

    pub fn is_new(&self) -> bool {
        self.times_seen == 0
    }

    pub fn counters_consistent(&self) -> bool {
        u64::from(self.times_seen)
            == u64::from(self.times_correct) + u64::from(self.times_incorrect)
    }

    pub(crate) fn schedule_from(&mut self, today: NaiveDate) {
        self.next_review_date = today + Duration::days(i64::from(self.review_interval_days));
    }
}
