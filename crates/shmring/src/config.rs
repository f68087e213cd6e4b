use std::time::Duration;

/// How the blocking wrappers wait between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Sleep a fixed interval, then retry. Works across process boundaries.
    Poll,
    /// Park until the counterpart makes progress. Both sides must share a process.
    Park,
}

/// Configuration for the blocking wrappers and the hosts.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Wait strategy used when the ring is full (producer) or empty (consumer)
    pub wait: WaitStrategy,
    /// Producer sleep between attempts under [`WaitStrategy::Poll`] (default: 50ms)
    pub producer_backoff: Duration,
    /// Consumer sleep between attempts under [`WaitStrategy::Poll`] (default: 10ms)
    pub consumer_backoff: Duration,
    /// Upper bound on a single park under [`WaitStrategy::Park`] (default: 10ms)
    pub park_timeout: Duration,
    /// Enable per-side metrics collection
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    pub const fn new(
        wait: WaitStrategy,
        producer_backoff: Duration,
        consumer_backoff: Duration,
        enable_metrics: bool,
    ) -> Self {
        Self {
            wait,
            producer_backoff,
            consumer_backoff,
            park_timeout: DEFAULT_PARK_TIMEOUT,
            enable_metrics,
        }
    }

    /// Sets the wait strategy.
    pub const fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Sets the producer backoff interval.
    pub const fn with_producer_backoff(mut self, interval: Duration) -> Self {
        self.producer_backoff = interval;
        self
    }

    /// Sets the consumer backoff interval.
    pub const fn with_consumer_backoff(mut self, interval: Duration) -> Self {
        self.consumer_backoff = interval;
        self
    }

    /// Sets the park timeout.
    pub const fn with_park_timeout(mut self, timeout: Duration) -> Self {
        self.park_timeout = timeout;
        self
    }

    /// Enables or disables metrics.
    pub const fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Producer interval divided by consumer interval.
    ///
    /// Returns `None` when the consumer interval is zero.
    pub fn backoff_ratio(&self) -> Option<f64> {
        if self.consumer_backoff.is_zero() {
            return None;
        }
        Some(self.producer_backoff.as_secs_f64() / self.consumer_backoff.as_secs_f64())
    }
}

impl Default for Config {
    fn default() -> Self {
        LEGACY_CONFIG
    }
}

const DEFAULT_PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// Interval polling with a 5:1 producer/consumer ratio (50ms / 10ms)
pub const LEGACY_CONFIG: Config = Config::new(
    WaitStrategy::Poll,
    Duration::from_millis(50),
    Duration::from_millis(10),
    false,
);

/// Event-driven waking; the backoff intervals are kept for a later switch back to polling
pub const EVENT_DRIVEN_CONFIG: Config = LEGACY_CONFIG.with_wait(WaitStrategy::Park);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_legacy_polling() {
        let config = Config::default();
        assert_eq!(config.wait, WaitStrategy::Poll);
        assert_eq!(config.producer_backoff, Duration::from_millis(50));
        assert_eq!(config.consumer_backoff, Duration::from_millis(10));
        assert_eq!(config.backoff_ratio(), Some(5.0));
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_builders() {
        let config = EVENT_DRIVEN_CONFIG
            .with_park_timeout(Duration::from_millis(1))
            .with_consumer_backoff(Duration::ZERO)
            .with_metrics(true);

        assert_eq!(config.wait, WaitStrategy::Park);
        assert_eq!(config.park_timeout, Duration::from_millis(1));
        assert_eq!(config.backoff_ratio(), None);
        assert!(config.enable_metrics);
    }
}
