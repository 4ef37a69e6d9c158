//! # Backoff Policy
//!
//! Decides whether a failed request is retried and how long to wait first.
//!
//! Only transient failures are retried: transport errors and the statuses in
//! [`RETRIABLE_STATUS_CODES`](crate::error::RETRIABLE_STATUS_CODES). The delay
//! for attempt `n` is drawn uniformly from `[0, 2^n)` time units, and attempts
//! beyond the ceiling give up.
//!
//! ```
//! use core_upload::backoff::{BackoffPolicy, RetryDecision};
//! use core_upload::error::ErrorKind;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::default();
//! match policy.decide_with_draw(3, ErrorKind::Status(503), 0.5) {
//!     RetryDecision::RetryAfter(delay) => assert_eq!(delay, Duration::from_secs(4)),
//!     RetryDecision::GiveUp => unreachable!(),
//! }
//! assert_eq!(policy.decide(0, ErrorKind::Status(400)), RetryDecision::GiveUp);
//! ```

use crate::error::ErrorKind;
use core_runtime::config::UploadSettings;
use rand::Rng;
use std::time::Duration;

/// Default ceiling on retries.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Outcome of consulting the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Exponential backoff with full jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    max_retries: u32,
    unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_retries: u32, unit: Duration) -> Self {
        Self { max_retries, unit }
    }

    pub fn from_settings(settings: &UploadSettings) -> Self {
        Self::new(settings.max_retries, settings.backoff_unit)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Decide using a fresh random draw.
    pub fn decide(&self, attempt: u32, error: ErrorKind) -> RetryDecision {
        let draw = rand::thread_rng().gen_range(0.0..1.0);
        self.decide_with_draw(attempt, error, draw)
    }

    /// Decide using `draw` in `[0, 1)` as the jitter factor.
    ///
    /// Draws outside that range are clamped into it.
    pub fn decide_with_draw(&self, attempt: u32, error: ErrorKind, draw: f64) -> RetryDecision {
        if !error.is_retriable() || attempt > self.max_retries {
            return RetryDecision::GiveUp;
        }

        let draw = if draw.is_finite() {
            draw.clamp(0.0, 1.0 - f64::EPSILON)
        } else {
            0.0
        };

        // Integer nanoseconds keep the delay strictly below the window
        let window = self
            .unit
            .as_nanos()
            .saturating_mul(1u128 << attempt.min(64));
        let nanos = ((draw * window as f64) as u128).min(window.saturating_sub(1));

        RetryDecision::RetryAfter(Duration::new(
            (nanos / NANOS_PER_SEC) as u64,
            (nanos % NANOS_PER_SEC) as u32,
        ))
    }
}

/// [`BackoffPolicy::decide`] with the default ceiling and a one-second unit.
pub fn decide(attempt: u32, error: ErrorKind) -> RetryDecision {
    BackoffPolicy::default().decide(attempt, error)
}
