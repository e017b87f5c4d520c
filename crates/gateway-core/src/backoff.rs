//! Exponential retry delay with jitter.
//!
//! Every reconnect and restart policy in the gateway owns one [`Backoff`].
//! The delay for attempt `n` is `min(max, base × 2^n) + uniform[0, jitter)`.
//! The base part is derived from the attempt counter alone, so jitter never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use gateway_core::Backoff;
//!
//! let mut backoff = Backoff::new(
//!     Duration::from_millis(1000),
//!     Duration::from_millis(15000),
//!     Duration::ZERO,
//! );
//!
//! assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
//! assert_eq!(backoff.next_delay(), Duration::from_millis(2000));
//! backoff.reset();
//! assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of a [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base: Duration,
    /// Cap applied before jitter is added.
    pub max: Duration,
    /// Upper bound (exclusive) of the random amount added to each delay.
    pub jitter: Duration,
}

impl BackoffConfig {
    /// Decoder restart policy: 1s doubling up to 15s, 250ms jitter.
    pub const RESTART: Self = Self {
        base: Duration::from_millis(1000),
        max: Duration::from_millis(15000),
        jitter: Duration::from_millis(250),
    };

    /// TCP reconnect policy: 500ms doubling up to 10s, 250ms jitter.
    pub const RECONNECT: Self = Self {
        base: Duration::from_millis(500),
        max: Duration::from_millis(10000),
        jitter: Duration::from_millis(250),
    };
}

/// Stateful delay calculator.
///
/// Not shared: each supervisor or forwarder holds its own instance.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff from raw durations.
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self::from_config(BackoffConfig { base, max, jitter })
    }

    /// Create a backoff from a [`BackoffConfig`].
    pub fn from_config(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Compute the delay for the current attempt and advance the counter.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = duration_ms(self.config.base);
        let max_ms = duration_ms(self.config.max);
        let grown = base_ms.saturating_mul(2u64.saturating_pow(self.attempt));
        let capped = grown.min(max_ms);

        let jitter_ms = duration_ms(self.config.jitter);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_ms)
        };

        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped.saturating_add(jitter))
    }

    /// Forget all previous failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The parameters this backoff was built with.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl From<BackoffConfig> for Backoff {
    fn from(config: BackoffConfig) -> Self {
        Self::from_config(config)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_range(d: Duration, lo: u64, hi: u64) -> bool {
        let ms = d.as_millis() as u64;
        ms >= lo && ms < hi
    }

    #[test]
    fn test_delays_double_then_cap() {
        let mut backoff = Backoff::new(
            Duration::from_millis(1000),
            Duration::from_millis(15000),
            Duration::from_millis(250),
        );

        assert!(in_range(backoff.next_delay(), 1000, 1250));
        assert!(in_range(backoff.next_delay(), 2000, 2250));
        assert!(in_range(backoff.next_delay(), 4000, 4250));
        assert!(in_range(backoff.next_delay(), 8000, 8250));
        for _ in 0..20 {
            assert!(in_range(backoff.next_delay(), 15000, 15250));
        }
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = Backoff::from_config(BackoffConfig::RESTART);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(in_range(backoff.next_delay(), 1000, 1250));
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let mut backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::ZERO,
        );
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_huge_attempt_count_saturates() {
        let mut backoff = Backoff::new(
            Duration::from_millis(1000),
            Duration::from_millis(15000),
            Duration::ZERO,
        );
        for _ in 0..200 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_millis(15000));
    }
}
