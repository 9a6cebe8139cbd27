//! Redelivery policy

use praxis_config::EventBusSettings;
use std::time::Duration;

/// Per-subscriber redelivery for a single publish.
///
/// A subscriber gets `max_retries + 1` attempts. The wait after failed
/// attempt `n` (0-based) is `base_delay * backoff_multiplier^n`, capped at
/// `max_delay` when set.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff_multiplier,
            max_delay: None,
        }
    }

    /// Single attempt, no redelivery.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 1.0)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Total attempts a subscriber may consume.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(0.0).powi(attempt as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;

        let delay = if millis.is_finite() && millis < u64::MAX as f64 {
            Duration::from_millis(millis as u64)
        } else {
            Duration::from_millis(u64::MAX)
        };

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl From<&EventBusSettings> for RetryPolicy {
    fn from(settings: &EventBusSettings) -> Self {
        Self::new(
            settings.max_retries,
            settings.base_delay,
            settings.backoff_multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2.0);

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_max_delay_caps() {
        let policy =
            RetryPolicy::new(10, Duration::from_millis(100), 3.0).with_max_delay(Duration::from_secs(1));

        assert_eq!(policy.delay_for(1), Duration::from_millis(300));
        assert_eq!(policy.delay_for(5), Duration::from_secs(1));
        assert_eq!(policy.delay_for(200), Duration::from_secs(1));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_from_settings() {
        let settings = EventBusSettings::default();
        let policy = RetryPolicy::from(&settings);

        assert_eq!(policy.max_retries, settings.max_retries);
        assert_eq!(policy.base_delay, settings.base_delay);
        assert!(policy.max_delay.is_none());
    }
}
