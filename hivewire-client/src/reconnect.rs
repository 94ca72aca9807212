//! Reconnection strategies and attempt bookkeeping
//!
//! When the transport drops, two pieces decide what happens next:
//! - a [`ReconnectionStrategy`] says how long to wait before attempt `n`
//! - the [`ReconnectionController`] counts attempts and decides between
//!   scheduling another one and giving up
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: `base × 2^(n−1)` with ±25% symmetric jitter,
//!   capped at a maximum (default)
//! - **FixedDelay**: constant delay between attempts
//!
//! # Examples
//!
//! ```rust
//! use hivewire_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30))
//!     .without_jitter();
//!
//! assert_eq!(backoff.next_delay(1), Some(Duration::from_secs(1)));
//! assert_eq!(backoff.next_delay(3), Some(Duration::from_secs(4)));
//! assert_eq!(backoff.next_delay(9), Some(Duration::from_secs(30)));
//! ```

use hivewire_core::ReconnectionInfo;
use rand::Rng;
use std::time::Duration;

/// Jitter applied by [`ExponentialBackoff`] unless overridden
pub const DEFAULT_JITTER: f64 = 0.25;

/// Trait for reconnection delay strategies
///
/// The strategy only computes delays. Counting attempts and enforcing the
/// attempt limit is the controller's job, so every strategy gets the same
/// bounded-attempt semantics.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnection attempt `attempt` (1-indexed)
    ///
    /// Returning `None` gives up early, as if the attempt limit was reached.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Reset any accumulated state after a successful connection
    fn reset(&mut self) {}
}

/// Exponential backoff with symmetric jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl ExponentialBackoff {
    /// Backoff from `base_delay` doubling up to `max_delay`, with ±25% jitter
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Jitter as a fraction of the computed delay, clamped to `[0, 1]`
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Deterministic delays
    pub fn without_jitter(self) -> Self {
        self.with_jitter(0.0)
    }

    /// Uncapped `base × 2^(attempt−1)` in milliseconds
    fn nominal_millis(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        self.base_delay.as_millis() as f64 * 2f64.powi(exponent)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        let nominal = self.nominal_millis(attempt);
        let max = self.max_delay.as_millis() as f64;

        // nominal ± nominal × jitter × r with r uniform in [-1, 1], then capped,
        // so the cap holds after jitter too
        let spread: f64 = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        let jittered = (nominal + nominal * self.jitter * spread).clamp(0.0, max);
        Some(Duration::from_millis(jittered.round() as u64))
    }
}

/// Fixed delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        Some(self.delay)
    }
}

/// What to do after a transport or handshake failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule attempt number `attempt` after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted; an explicit retry is required
    GiveUp { attempts: u32 },
}

/// Attempt counter with bounded-attempt semantics
///
/// `attempts` counts reconnection attempts scheduled since the last successful
/// connect. It never exceeds `max_attempts` and goes back to zero on success
/// or on a manual reset.
pub struct ReconnectionController {
    strategy: Box<dyn ReconnectionStrategy>,
    attempts: u32,
    max_attempts: u32,
    reconnecting: bool,
}

impl ReconnectionController {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>, max_attempts: u32) -> Self {
        Self {
            strategy,
            attempts: 0,
            max_attempts,
            reconnecting: false,
        }
    }

    /// Decide how to react to a lost or refused connection
    pub fn on_failure(&mut self) -> ReconnectDecision {
        if self.attempts >= self.max_attempts {
            self.reconnecting = false;
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }

        let attempt = self.attempts + 1;
        match self.strategy.next_delay(attempt) {
            Some(delay) => {
                self.attempts = attempt;
                self.reconnecting = true;
                ReconnectDecision::Retry { attempt, delay }
            }
            None => {
                self.reconnecting = false;
                ReconnectDecision::GiveUp {
                    attempts: self.attempts,
                }
            }
        }
    }

    /// A session was established
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.reconnecting = false;
        self.strategy.reset();
    }

    /// Manual retry or teardown: start the next cycle from zero
    pub fn reset(&mut self) {
        self.on_connected();
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn info(&self) -> ReconnectionInfo {
        ReconnectionInfo {
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            is_reconnecting: self.reconnecting,
        }
    }
}
