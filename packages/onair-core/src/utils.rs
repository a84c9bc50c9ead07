//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Playback Position
// ─────────────────────────────────────────────────────────────────────────────

/// Clamps a playback position to `[0, duration]`.
///
/// With an unknown (or nonsensical) duration only the lower bound applies.
/// NaN positions collapse to 0.
#[must_use]
pub fn clamp_position(position: f64, duration: Option<f64>) -> f64 {
    if position.is_nan() {
        return 0.0;
    }
    let upper = duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(f64::INFINITY);
    position.clamp(0.0, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn clamp_position_respects_bounds() {
        assert_eq!(clamp_position(-5.0, Some(100.0)), 0.0);
        assert_eq!(clamp_position(150.0, Some(100.0)), 100.0);
        assert_eq!(clamp_position(42.0, Some(100.0)), 42.0);
    }

    #[test]
    fn clamp_position_without_duration_only_floors() {
        assert_eq!(clamp_position(1e6, None), 1e6);
        assert_eq!(clamp_position(-1.0, None), 0.0);
        assert_eq!(clamp_position(10.0, Some(f64::NAN)), 10.0);
        assert_eq!(clamp_position(f64::NAN, Some(10.0)), 0.0);
    }
}
