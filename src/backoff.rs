//! # Backoff generators for the readiness-probe loop.
//!
//! A backoff generator is a stateful function returning the delay to sleep
//! before the *next* attempt. Two built-ins are provided:
//!
//! - [`const_backoff`] returns the same delay forever;
//! - [`exp_backoff`] grows the delay exponentially with optional ±10% jitter,
//!   clamped to `[min, max]`.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use appvisor::exp_backoff;
//!
//! let mut next = exp_backoff(
//!     Duration::from_millis(100),
//!     Duration::from_secs(1),
//!     2.0,
//!     false,
//! );
//!
//! assert_eq!(next(), Duration::from_millis(100));
//! assert_eq!(next(), Duration::from_millis(200));
//! assert_eq!(next(), Duration::from_millis(400));
//! assert_eq!(next(), Duration::from_millis(800));
//! // 1600ms is clamped to the 1s cap.
//! assert_eq!(next(), Duration::from_secs(1));
//! ```

use std::time::Duration;

use rand::Rng;

/// Stateful generator producing the next retry delay on each call.
pub type BackoffFn = Box<dyn FnMut() -> Duration + Send + Sync + 'static>;

/// Returns a generator that yields `delay` on every call.
pub fn const_backoff(delay: Duration) -> BackoffFn {
    Box::new(move || delay)
}

/// Returns a generator with exponential growth.
///
/// The n-th call (0-indexed) yields `min * base.powi(n)`, multiplied by a
/// uniform factor in `[0.9, 1.1)` when `jitter` is enabled, then clamped to
/// `[min, max]`.
///
/// # Panics
/// Panics when `min` or `max` is zero, or when `min > max` — these are
/// programmer errors.
pub fn exp_backoff(min: Duration, max: Duration, base: f64, jitter: bool) -> BackoffFn {
    if min.is_zero() || max.is_zero() {
        panic!("exp_backoff: min and max delay must not be zero");
    }
    if min > max {
        panic!("exp_backoff: min delay must not exceed max delay");
    }

    let min_f = min.as_secs_f64();
    let max_f = max.as_secs_f64();
    let mut attempt: i32 = 0;

    Box::new(move || {
        let mut delay = min_f * base.powi(attempt);
        attempt = attempt.saturating_add(1);

        if jitter {
            delay *= rand::rng().random_range(0.9..1.1);
        }

        Duration::from_secs_f64(delay.clamp(min_f, max_f))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_backoff_never_changes() {
        let mut next = const_backoff(Duration::from_millis(250));
        for _ in 0..5 {
            assert_eq!(next(), Duration::from_millis(250));
        }
    }

    #[test]
    fn exp_backoff_matches_the_closed_form() {
        let min = Duration::from_millis(50);
        let max = Duration::from_secs(2);
        let mut next = exp_backoff(min, max, 3.0, false);

        for n in 0..8 {
            let want = min.as_secs_f64() * 3f64.powi(n);
            let want = want.clamp(min.as_secs_f64(), max.as_secs_f64());
            assert_eq!(next(), Duration::from_secs_f64(want), "attempt {n}");
        }
    }

    #[test]
    fn exp_backoff_clamps_to_min_for_shrinking_bases() {
        let min = Duration::from_millis(100);
        let mut next = exp_backoff(min, Duration::from_secs(1), 0.5, false);

        assert_eq!(next(), min);
        // 50ms would be below the floor.
        assert_eq!(next(), min);
    }

    #[test]
    fn exp_backoff_jitter_stays_within_ten_percent() {
        let min = Duration::from_millis(100);
        let max = Duration::from_secs(60);
        let mut next = exp_backoff(min, max, 2.0, true);

        for n in 0..6 {
            let base = min.as_secs_f64() * 2f64.powi(n);
            let got = next().as_secs_f64();
            assert!(
                got >= base * 0.9 - f64::EPSILON && got < base * 1.1 + f64::EPSILON,
                "attempt {n}: got {got}, base {base}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "must not be zero")]
    fn exp_backoff_rejects_zero_min() {
        let _ = exp_backoff(Duration::ZERO, Duration::from_secs(1), 2.0, false);
    }

    #[test]
    #[should_panic(expected = "must not exceed")]
    fn exp_backoff_rejects_inverted_bounds() {
        let _ = exp_backoff(
            Duration::from_secs(2),
            Duration::from_secs(1),
            2.0,
            false,
        );
    }
}
