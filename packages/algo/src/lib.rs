//! # vocabtamil-algo
//!
//! Pure learning rules for the VocabTamil backend:
//!
//! - **Spaced repetition** - per-word progress update after one quiz answer
//! - **Gamification** - XP awards, session completion bonus, daily streaks
//!
//! Nothing in this crate touches a database or a clock: the caller passes
//! `today` in and persists what comes out.
//!
//! ## Modules
//!
//! - [`types`] - mastery levels, progress record, constants
//! - [`srs`] - the progress updater
//! - [`gamification`] - XP and streak arithmetic
//! - [`sanitize`] - numeric helpers (hundredths rounding, response times)
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use vocabtamil_algo::{srs, MasteryLevel, WordProgress};
//!
//! let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let progress = WordProgress::new_for(today);
//! let update = srs::update(&progress, true, Some(4.2), today).unwrap();
//!
//! assert_eq!(update.progress.review_interval_days, 3);
//! assert_eq!(update.progress.mastery_level, MasteryLevel::Learning);
//! assert!(update.mastery_increased());
//! ```

pub mod gamification;
pub mod sanitize;
pub mod srs;
pub mod types;

pub use gamification::{answer_xp, completion_bonus, StreakState};
pub use srs::{update, InvalidStateError, MasteryChange, ProgressUpdate};
pub use types::*;
