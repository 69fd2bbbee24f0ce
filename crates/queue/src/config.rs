use std::time::Duration;

/// Retry/backoff policy for a single command item's dispatch attempts
/// (§4.3 step 6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub base_backoff: Duration,
    pub factor: u32,
    pub max_retries: u32,
    /// Hard wall-clock ceiling across all attempts for one item (§4.3, §5:
    /// "30s per retry chain").
    pub item_budget: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_millis(200),
            factor: 2,
            max_retries: 5,
            item_budget: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before attempt number `attempt` (1-based), before any
    /// `Retry-After` hint is applied.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(self.factor.saturating_pow(exponent))
    }
}

/// Dispatcher-wide configuration (§4.3, §5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherConfig {
    /// Size of the bounded-concurrency worker pool, `W` (§4.3, default small
    /// e.g. 4).
    pub worker_count: usize,
    /// Bounded queue size, `Qmax` (§4.3, default 1000).
    pub queue_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 1000,
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let retry = RetryConfig {
            base_backoff: Duration::from_millis(100),
            factor: 2,
            ..RetryConfig::default()
        };
        assert_eq!(retry.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn defaults_match_spec_values() {
        let config = DispatcherConfig::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.retry.item_budget, Duration::from_secs(30));
    }
}
