//! Spaced-repetition progress updater
//!
//! One call per answered quiz question. The function is pure: it takes the
//! stored progress and the answer outcome and returns the next state plus
//! the mastery transition that the gamification layer keys off.
//!
//! Rules:
//! - correct: interval grows to `max(interval + 1, ceil(interval * ease))`,
//!   ease +0.10 (no upper cap), mastery promoted one step when the new
//!   interval reaches the next level's threshold (1 / 6 / 14 days)
//! - incorrect: interval back to 1 day, ease -0.20 (floor 1.30), mastery
//!   demoted one step

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sanitize;
use crate::types::{
    MasteryLevel, WordProgress, EASE_BONUS, EASE_PENALTY, INITIAL_INTERVAL_DAYS,
    MAX_INTERVAL_DAYS, MIN_EASE_FACTOR,
};

/// The stored record cannot be scheduled; this is a caller bug.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidStateError {
    #[error("ease factor must be positive, got {0}")]
    NonPositiveEaseFactor(f64),
    #[error("review interval must be at least one day")]
    NonPositiveInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryChange {
    Promoted,
    Demoted,
    Unchanged,
}

impl MasteryChange {
    fn between(before: MasteryLevel, after: MasteryLevel) -> Self {
        match after.cmp(&before) {
            std::cmp::Ordering::Greater => Self::Promoted,
            std::cmp::Ordering::Less => Self::Demoted,
            std::cmp::Ordering::Equal => Self::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub progress: WordProgress,
    pub previous_level: MasteryLevel,
    pub change: MasteryChange,
}

impl ProgressUpdate {
    pub fn mastery_increased(&self) -> bool {
        self.change == MasteryChange::Promoted
    }
}

/// Applies one answer to `progress`.
///
/// `response_time_seconds` is recorded (last value and running average) but
/// never influences scheduling. `today` anchors `next_review_date`.
pub fn update(
    progress: &WordProgress,
    was_correct: bool,
    response_time_seconds: Option<f64>,
    today: NaiveDate,
) -> Result<ProgressUpdate, InvalidStateError> {
    validate(progress)?;

    let previous_level = progress.mastery_level;
    let mut next = progress.clone();
    next.times_seen = next.times_seen.saturating_add(1);

    if let Some(seconds) = sanitize::response_time(response_time_seconds) {
        let average = match next.average_response_time {
            Some(avg) => (avg + seconds) / 2.0,
            None => seconds,
        };
        next.average_response_time = Some(sanitize::round_hundredths(average));
        next.last_response_time = Some(sanitize::round_hundredths(seconds));
    }

    if was_correct {
        next.times_correct = next.times_correct.saturating_add(1);

        let ease = sanitize::to_hundredths(progress.ease_factor);
        let scaled = sanitize::scale_interval(progress.review_interval_days, ease);
        let grown = scaled.max(u64::from(progress.review_interval_days) + 1);
        next.review_interval_days = grown.min(u64::from(MAX_INTERVAL_DAYS)) as u32;

        next.ease_factor = sanitize::add_hundredths(progress.ease_factor, EASE_BONUS);

        if let Some(candidate) = previous_level.next() {
            if next.review_interval_days >= candidate.threshold_days() {
                next.mastery_level = candidate;
            }
        }
    } else {
        next.times_incorrect = next.times_incorrect.saturating_add(1);
        next.review_interval_days = INITIAL_INTERVAL_DAYS;

        next.ease_factor =
            sanitize::add_hundredths(progress.ease_factor, -EASE_PENALTY).max(MIN_EASE_FACTOR);

        next.mastery_level = previous_level.demote();
    }

    next.schedule_from(today);

    Ok(ProgressUpdate {
        change: MasteryChange::between(previous_level, next.mastery_level),
        previous_level,
        progress: next,
    })
}

fn validate(progress: &WordProgress) -> Result<(), InvalidStateError> {
    let ease = progress.ease_factor;
    if sanitize::is_invalid(ease) || ease <= 0.0 {
        return Err(InvalidStateError::NonPositiveEaseFactor(ease));
    }
    if progress.review_interval_days == 0 {
        return Err(InvalidStateError::NonPositiveInterval);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_EASE_FACTOR;
    use chrono::Duration;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn state(interval: u32, ease: f64, level: MasteryLevel) -> WordProgress {
        WordProgress {
            review_interval_days: interval,
            ease_factor: ease,
            mastery_level: level,
            ..WordProgress::new_for(day())
        }
    }

    #[test]
    fn correct_then_incorrect_matches_reference_walkthrough() {
        let start = WordProgress::new_for(day());

        let first = update(&start, true, None, day()).unwrap();
        assert_eq!(first.progress.review_interval_days, 3);
        assert_eq!(first.progress.ease_factor, 2.6);
        assert_eq!(first.progress.mastery_level, MasteryLevel::Learning);
        assert_eq!(first.progress.next_review_date, day() + Duration::days(3));
        assert_eq!(first.change, MasteryChange::Promoted);

        let second = update(&first.progress, false, None, day()).unwrap();
        assert_eq!(second.progress.review_interval_days, 1);
        assert_eq!(second.progress.ease_factor, 2.4);
        assert_eq!(second.progress.mastery_level, MasteryLevel::New);
        assert_eq!(second.progress.next_review_date, day() + Duration::days(1));
        assert_eq!(second.change, MasteryChange::Demoted);
        assert_eq!(second.progress.times_seen, 2);
        assert_eq!(second.progress.times_correct, 1);
        assert_eq!(second.progress.times_incorrect, 1);
    }

    #[test]
    fn promotion_waits_for_threshold() {
        // 3 days at ease 1.3 grows to 4: not yet familiar (6)
        let progress = state(3, 1.3, MasteryLevel::Learning);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.review_interval_days, 4);
        assert_eq!(result.progress.mastery_level, MasteryLevel::Learning);
        assert_eq!(result.change, MasteryChange::Unchanged);

        // 3 days at ease 2.6 grows to 8: familiar
        let progress = state(3, 2.6, MasteryLevel::Learning);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.review_interval_days, 8);
        assert_eq!(result.progress.mastery_level, MasteryLevel::Familiar);
    }

    #[test]
    fn promotion_never_skips_a_level() {
        // interval jumps well past the mastered threshold from New
        let progress = state(30, 2.5, MasteryLevel::New);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.mastery_level, MasteryLevel::Learning);
    }

    #[test]
    fn mastered_stays_mastered_on_success() {
        let progress = state(20, 2.8, MasteryLevel::Mastered);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.mastery_level, MasteryLevel::Mastered);
        assert_eq!(result.change, MasteryChange::Unchanged);
        assert_eq!(result.progress.review_interval_days, 56);
    }

    #[test]
    fn exact_products_do_not_round_up() {
        let progress = state(5, 2.0, MasteryLevel::Learning);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.review_interval_days, 10);
    }

    #[test]
    fn ease_floor_holds() {
        let progress = state(1, 1.4, MasteryLevel::Learning);
        let result = update(&progress, false, None, day()).unwrap();
        assert_eq!(result.progress.ease_factor, MIN_EASE_FACTOR);
    }

    #[test]
    fn interval_is_capped() {
        let progress = state(MAX_INTERVAL_DAYS, 3.0, MasteryLevel::Mastered);
        let result = update(&progress, true, None, day()).unwrap();
        assert_eq!(result.progress.review_interval_days, MAX_INTERVAL_DAYS);
    }

    #[test]
    fn huge_ease_factor_still_schedules() {
        for ease in [1e15, 1e18] {
            let progress = state(1000, ease, MasteryLevel::Familiar);

            let correct = update(&progress, true, None, day()).unwrap();
            assert_eq!(correct.progress.review_interval_days, MAX_INTERVAL_DAYS);
            assert!(correct.progress.ease_factor >= ease);
            assert_eq!(correct.progress.mastery_level, MasteryLevel::Mastered);

            let wrong = update(&progress, false, None, day()).unwrap();
            assert_eq!(wrong.progress.review_interval_days, 1);
            assert!(wrong.progress.ease_factor > MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn response_time_is_recorded_not_scheduled() {
        let start = WordProgress::new_for(day());
        let fast = update(&start, true, Some(1.0), day()).unwrap();
        let slow = update(&start, true, Some(30.0), day()).unwrap();
        assert_eq!(
            fast.progress.review_interval_days,
            slow.progress.review_interval_days
        );
        assert_eq!(fast.progress.last_response_time, Some(1.0));

        let again = update(&fast.progress, true, Some(3.0), day()).unwrap();
        assert_eq!(again.progress.average_response_time, Some(2.0));
        assert_eq!(again.progress.last_response_time, Some(3.0));

        let ignored = update(&again.progress, true, Some(-4.0), day()).unwrap();
        assert_eq!(ignored.progress.average_response_time, Some(2.0));
    }

    #[test]
    fn rejects_invalid_state() {
        let bad_ease = state(1, 0.0, MasteryLevel::New);
        assert_eq!(
            update(&bad_ease, true, None, day()),
            Err(InvalidStateError::NonPositiveEaseFactor(0.0))
        );

        let bad_interval = state(0, DEFAULT_EASE_FACTOR, MasteryLevel::New);
        assert_eq!(
            update(&bad_interval, false, None, day()),
            Err(InvalidStateError::NonPositiveInterval)
        );

        let nan_ease = state(1, f64::NAN, MasteryLevel::New);
        assert!(update(&nan_ease, true, None, day()).is_err());
    }

    #[test]
    fn duplicate_event_is_not_idempotent() {
        let start = WordProgress::new_for(day());
        let once = update(&start, true, None, day()).unwrap().progress;
        let twice = update(&once, true, None, day()).unwrap().progress;
        assert_ne!(once, twice);
        assert_eq!(twice.times_seen, 2);
    }

    fn arb_level() -> impl Strategy<Value = MasteryLevel> {
        (0i64..=3).prop_map(|v| MasteryLevel::from_ordinal(v).unwrap())
    }

    fn arb_progress() -> impl Strategy<Value = WordProgress> {
        (1u32..=1000, 130i64..=400, arb_level(), 0u32..50, 0u32..50).prop_map(
            |(interval, ease, level, correct, incorrect)| WordProgress {
                mastery_level: level,
                times_seen: correct + incorrect,
                times_correct: correct,
                times_incorrect: incorrect,
                review_interval_days: interval,
                ease_factor: ease as f64 / 100.0,
                ..WordProgress::new_for(day())
            },
        )
    }

    proptest! {
        #[test]
        fn correct_answer_never_regresses(progress in arb_progress()) {
            let result = update(&progress, true, None, day()).unwrap();
            prop_assert!(result.progress.review_interval_days >= progress.review_interval_days);
            prop_assert!(result.progress.ease_factor >= progress.ease_factor);
            prop_assert!(result.progress.mastery_level >= progress.mastery_level);
            prop_assert!(result.progress.counters_consistent());
        }

        #[test]
        fn incorrect_answer_resets_interval(progress in arb_progress()) {
            let result = update(&progress, false, None, day()).unwrap();
            prop_assert_eq!(result.progress.review_interval_days, 1);
            prop_assert!(result.progress.mastery_level <= progress.mastery_level);
            prop_assert_eq!(result.progress.next_review_date, day() + Duration::days(1));
            prop_assert!(result.progress.counters_consistent());
        }

        #[test]
        fn ease_never_below_floor(outcomes in proptest::collection::vec(any::<bool>(), 1..80)) {
            let mut progress = WordProgress::new_for(day());
            for correct in outcomes {
                progress = update(&progress, correct, None, day()).unwrap().progress;
                prop_assert!(progress.ease_factor >= MIN_EASE_FACTOR);
                prop_assert!((0..=3).contains(&progress.mastery_level.ordinal()));
            }
        }

        #[test]
        fn transitions_move_at_most_one_step(progress in arb_progress(), correct in any::<bool>()) {
            let result = update(&progress, correct, None, day()).unwrap();
            let delta = result.progress.mastery_level.ordinal() - progress.mastery_level.ordinal();
            prop_assert!((-1..=1).contains(&delta));
        }
    }
}
