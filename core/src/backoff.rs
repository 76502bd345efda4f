//! Backoff delays between retry attempts.
//!
//! Exponential growth from a base delay, capped at a maximum, with
//! bounded random jitter so concurrently-retrying operations do not
//! resynchronize. The returned delay always stays within
//! `[base, max]` regardless of attempt number or jitter draw.

use std::time::Duration;

use rand::Rng;

use crate::error::ErrorKind;

/// The bounds the calculator works within.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-indexed):
    /// `min(base * 2^attempt, max)` plus jitter of up to a quarter of the
    /// exponential term, clamped to `[base, max]`.
    ///
    /// Context-loss retries start from a doubled base — the host context
    /// needs noticeably longer than a flaky call to come back — but stay
    /// under the same cap.
    pub fn delay(&self, attempt: u32, kind: Option<ErrorKind>) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        // The ceiling never drops below the floor, so a misconfigured
        // `base > max` policy degrades to a fixed delay of `base`.
        let max_ms = (self.max.as_millis() as u64).max(base_ms);

        let curve_base = match kind {
            Some(ErrorKind::ContextLost) => base_ms.saturating_mul(2),
            _ => base_ms,
        };

        // Shifts past 2^20 are already far beyond any sane cap.
        let factor = 1u64.checked_shl(attempt.min(20)).unwrap_or(u64::MAX);
        let exponential = curve_base.saturating_mul(factor).min(max_ms);

        let jitter = if exponential == 0 {
            0
        } else {
            rand::rng().random_range(0..=exponential / 4)
        };

        let delayed = exponential.saturating_add(jitter).clamp(base_ms, max_ms);
        Duration::from_millis(delayed)
    }
}
