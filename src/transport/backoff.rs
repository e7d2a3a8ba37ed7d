//! Reconnect backoff policy
//!
//! Exponential delay with a cap and random jitter. The deterministic part
//! lives in `base_delay` so it can be tested without a RNG.

use std::time::Duration;

use rand::Rng;

/// Jittered exponential backoff
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound for the computed delay
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
    /// Jitter fraction, the final delay is scaled by `[1-j, 1+j]`
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Delay for the given attempt (0-based) without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let millis = self.initial.as_millis() as f64 * factor;
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Jittered delay for the given attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = self.jitter.min(1.0);
        let factor = rand::thread_rng().gen_range(1.0 - spread..=1.0 + spread);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_grows_exponentially() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        };
        assert_eq!(policy.base_delay(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_base_delay_caps_at_max() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(20), Duration::from_secs(60));
        // large attempt counts must not overflow
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(10),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.2,
        };
        for _ in 0..100 {
            let d = policy.delay(0);
            assert!(d >= Duration::from_secs(8), "delay {d:?} below jitter floor");
            assert!(d <= Duration::from_secs(12), "delay {d:?} above jitter ceiling");
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = BackoffPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay(2), policy.base_delay(2));
    }
}
