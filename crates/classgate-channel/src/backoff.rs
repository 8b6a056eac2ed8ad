//! Reconnection delays.
//!
//! After the authority connection drops, the channel waits before trying
//! again, doubling the wait each failed attempt up to a ceiling:
//!
//! ```text
//! attempt:  1     2     3     4     5 ...
//! delay:    1s    2s    4s    5s    5s      (each ±50% jitter)
//! ```
//!
//! Jitter keeps a fleet of gateways that lost the authority at the same
//! moment from reconnecting in lockstep. A successful connect resets the
//! sequence.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// BackoffConfig
// ---------------------------------------------------------------------------

/// Tuning for [`Backoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt. Default: 1 s.
    pub initial_delay: Duration,

    /// Factor applied to the delay after each failed attempt. Default: 2.
    pub multiplier: f64,

    /// Upper bound on any delay, jitter included. Default: 5 s.
    pub max_delay: Duration,

    /// Random spread as a fraction of the delay. `0.5` means each delay is
    /// drawn from `[delay * 0.5, delay * 1.5]`. Default: 0.5.
    pub jitter: f64,

    /// Give up after this many consecutive failures. `None` (the default)
    /// retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: 0.5,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Backoff::new`]. Rules:
    /// - `multiplier` below 1 (or not finite) becomes 1.
    /// - `jitter` clamped to `0.0..=1.0`.
    /// - `max_delay` forced ≥ `initial_delay`.
    pub fn validated(mut self) -> Self {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            warn!(multiplier = self.multiplier, "backoff multiplier below 1, using 1");
            self.multiplier = 1.0;
        }
        self.jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if self.max_delay < self.initial_delay {
            self.max_delay = self.initial_delay;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Produces the delay before each reconnect attempt.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config: config.validated(),
            attempts: 0,
        }
    }

    /// Returns the delay before the next attempt and counts the attempt.
    ///
    /// Returns `None` once `max_attempts` is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.config.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let exponent = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        let base = self.config.initial_delay.as_secs_f64()
            * self.config.multiplier.powi(exponent);
        let max = self.config.max_delay.as_secs_f64();
        let base = base.min(max);

        let spread = if self.config.jitter > 0.0 {
            rand::rng().random_range(-self.config.jitter..=self.config.jitter)
        } else {
            0.0
        };
        let delay = (base * (1.0 + spread)).clamp(0.0, max);

        self.attempts = self.attempts.saturating_add(1);
        Some(Duration::from_secs_f64(delay))
    }

    /// Starts the sequence over. Call after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
