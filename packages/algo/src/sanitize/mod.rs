//! Data Sanitization
//!
//! Numeric helpers shared by the updater and the gamification rules.
//!
//! Ease factors are persisted with two fractional digits, so all ease
//! arithmetic goes through hundredths to avoid binary drift
//! (`2.5 + 0.1` must be exactly `2.60`).

/// Whether the value is NaN or infinite
pub fn is_invalid(value: f64) -> bool {
    value.is_nan() || value.is_infinite()
}

/// Converts a decimal ease factor to integer hundredths, rounding half away from zero.
pub fn to_hundredths(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

pub fn from_hundredths(value: i64) -> f64 {
    value as f64 / 100.0
}

/// Largest magnitude whose hundredths are still exact integers in an `f64`.
const EXACT_HUNDREDTHS_LIMIT: f64 = 9_007_199_254_740_992.0;

/// `value + delta`, exact to the hundredth while the value is small enough
/// to carry hundredths at all. Larger values fall back to plain float math.
pub fn add_hundredths(value: f64, delta: f64) -> f64 {
    if (value * 100.0).abs() >= EXACT_HUNDREDTHS_LIMIT {
        return value + delta;
    }
    from_hundredths(to_hundredths(value) + to_hundredths(delta))
}

/// Rounds to two fractional digits.
pub fn round_hundredths(value: f64) -> f64 {
    from_hundredths(to_hundredths(value))
}

/// `ceil(days * ease)` computed on integer hundredths.
pub fn scale_interval(days: u32, ease_hundredths: i64) -> u64 {
    let product = u64::from(days).saturating_mul(ease_hundredths.max(0) as u64);
    product.div_ceil(100)
}

/// Accepts finite, strictly positive response times; anything else is dropped.
pub fn response_time(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|value| !is_invalid(*value) && *value > 0.0)
}

/// Clamps a percentage into `[0, 100]`, mapping invalid values to 0.
pub fn clamp_percentage(value: f64) -> f64 {
    if is_invalid(value) {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundredths_remove_float_drift() {
        assert_eq!(round_hundredths(2.5 + 0.1), 2.6);
        assert_eq!(to_hundredths(2.6 - 0.2), 240);
        assert_eq!(to_hundredths(1.3), 130);
    }

    #[test]
    fn scale_interval_rounds_up() {
        assert_eq!(scale_interval(1, 250), 3);
        assert_eq!(scale_interval(3, 260), 8);
        assert_eq!(scale_interval(5, 200), 10);
        assert_eq!(scale_interval(0, 250), 0);
    }

    #[test]
    fn add_hundredths_is_exact_for_small_values() {
        assert_eq!(add_hundredths(2.5, 0.1), 2.6);
        assert_eq!(add_hundredths(2.6, -0.2), 2.4);
        assert_eq!(add_hundredths(1e18, 0.1), 1e18);
    }

    #[test]
    fn scale_interval_saturates() {
        assert_eq!(scale_interval(1000, i64::MAX), u64::MAX.div_ceil(100));
        assert_eq!(to_hundredths(1e18), i64::MAX);
    }

    #[test]
    fn response_time_filters_garbage() {
        assert_eq!(response_time(Some(3.5)), Some(3.5));
        assert_eq!(response_time(Some(0.0)), None);
        assert_eq!(response_time(Some(-1.0)), None);
        assert_eq!(response_time(Some(f64::NAN)), None);
        assert_eq!(response_time(None), None);
    }

    #[test]
    fn percentage_is_clamped() {
        assert_eq!(clamp_percentage(120.0), 100.0);
        assert_eq!(clamp_percentage(-3.0), 0.0);
        assert_eq!(clamp_percentage(f64::INFINITY), 0.0);
        assert_eq!(clamp_percentage(42.5), 42.5);
    }
}
