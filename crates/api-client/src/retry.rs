use configuration::ApiSettings;
use std::time::Duration;

/// Bounded, fixed-delay retry.
///
/// The job runs hourly against a single symbol, so a constant pause between a
/// small number of attempts is enough; there is no exponential growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// The pause after the given (1-based) failed attempt.
    pub fn delay_after(&self, _attempt: u32) -> Duration {
        self.delay
    }

    /// Whether another attempt follows the given (1-based) failed attempt.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl From<&ApiSettings> for RetryPolicy {
    fn from(settings: &ApiSettings) -> Self {
        Self::new(settings.max_attempts, settings.retry_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_constant() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
    }

    #[test]
    fn retries_stop_at_the_last_attempt() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn built_from_api_settings() {
        let settings = ApiSettings { max_attempts: 5, retry_delay_secs: 1, ..ApiSettings::default() };
        assert_eq!(RetryPolicy::from(&settings), RetryPolicy::new(5, Duration::from_secs(1)));
    }
}
