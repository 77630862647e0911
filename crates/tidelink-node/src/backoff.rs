// ============================================
// File: crates/tidelink-node/src/backoff.rs
// ============================================
//! # Retry Backoff
//!
//! Exponential delay between connection attempts, with jitter so a fleet
//! of nodes restarting together does not reconnect in lockstep.
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::time::Duration;

use rand::Rng;

/// Exponential backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Attempts before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: Some(10),
        }
    }
}

impl BackoffPolicy {
    /// Policy that never gives up.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based), without jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// `delay(attempt)` scaled by a random factor in `[0.5, 1.0]`.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        self.delay(attempt).mul_f64(factor)
    }

    /// Returns `true` if attempt number `attempt` is allowed.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(1),
            max_attempts: Some(5),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_secs(1));
        assert_eq!(policy.delay(500), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::default();
        for attempt in 1..8 {
            let d = policy.jittered_delay(attempt);
            assert!(d <= policy.delay(attempt));
            assert!(d >= policy.delay(attempt) / 2);
        }
    }

    #[test]
    fn test_attempt_limit() {
        let policy = BackoffPolicy::default();
        assert!(policy.allows(10));
        assert!(!policy.allows(11));
        assert!(BackoffPolicy::unbounded().allows(u32::MAX));
    }
}
