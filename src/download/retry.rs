//! Backoff between persona attempts

use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first transient failure
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
        }
    }
}

impl BackoffConfig {
    /// No waiting at all between attempts
    pub fn none() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Set initial delay
    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set jitter factor
    pub fn jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Base delay before attempt `attempt + 1`, capped, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    /// Delay with random jitter added on top of the base delay
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_factor <= 0.0 || base.is_zero() {
            return base;
        }

        // Add jitter to prevent thundering herd
        let jitter_range = base.as_millis() as f64 * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        base + Duration::from_millis(jitter as u64)
    }

    /// Sleep for the delay of `attempt`
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_default() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_base_delay_grows_and_caps() {
        let config = BackoffConfig::default();
        assert_eq!(config.base_delay(0), Duration::from_millis(500));
        assert_eq!(config.base_delay(1), Duration::from_millis(1000));
        assert_eq!(config.base_delay(2), Duration::from_millis(2000));
        assert_eq!(config.base_delay(10), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = BackoffConfig::default();
        for _ in 0..50 {
            let delay = config.delay_for(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_jitter_clamping() {
        assert_eq!(BackoffConfig::default().jitter_factor(1.5).jitter_factor, 1.0);
        assert_eq!(BackoffConfig::default().jitter_factor(-0.5).jitter_factor, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_base_delay() {
        let config = BackoffConfig::default().jitter_factor(0.0);
        let start = tokio::time::Instant::now();
        config.wait(1).await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        BackoffConfig::none().wait(3).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
