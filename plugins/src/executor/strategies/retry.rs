use std::time::Duration;

use parawave_core::config::{OptimizationLevel, RetryConfig};
use parawave_core::executor::traits::RetryStrategyPlugin;

/// Resolved delay bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffBounds {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl BackoffBounds {
    pub fn from_config(config: &RetryConfig, level: OptimizationLevel) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms(level),
            max_delay_ms: config.max_delay_ms(level),
        }
    }
}

pub struct ExponentialBackoffPlugin {
    bounds: BackoffBounds,
}

pub struct LinearRetryPlugin {
    bounds: BackoffBounds,
}

impl ExponentialBackoffPlugin {
    pub fn new(bounds: BackoffBounds) -> Self {
        Self { bounds }
    }
}

impl LinearRetryPlugin {
    pub fn new(bounds: BackoffBounds) -> Self {
        Self { bounds }
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.saturating_sub(1).min(30);
        let delay = self.bounds.base_delay_ms.saturating_mul(exp);
        Duration::from_millis(delay.min(self.bounds.max_delay_ms))
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.bounds.base_delay_ms.saturating_mul(attempt.max(1) as u64);
        Duration::from_millis(delay.min(self.bounds.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(base: u64, max: u64) -> BackoffBounds {
        BackoffBounds {
            base_delay_ms: base,
            max_delay_ms: max,
        }
    }

    #[test]
    fn test_exponential_backoff() {
        let plugin = ExponentialBackoffPlugin::new(bounds(100, 1000));
        assert_eq!(plugin.next_delay(1).as_millis(), 100);
        assert_eq!(plugin.next_delay(2).as_millis(), 200);
        assert_eq!(plugin.next_delay(3).as_millis(), 400);
        assert_eq!(plugin.next_delay(8).as_millis(), 1000);
    }

    #[test]
    fn test_linear_backoff() {
        let plugin = LinearRetryPlugin::new(bounds(50, 200));
        assert_eq!(plugin.next_delay(1).as_millis(), 50);
        assert_eq!(plugin.next_delay(3).as_millis(), 150);
        assert_eq!(plugin.next_delay(9).as_millis(), 200);
    }

    #[test]
    fn test_bounds_follow_optimization_level() {
        let cfg = RetryConfig::default();
        assert_eq!(
            BackoffBounds::from_config(&cfg, OptimizationLevel::Aggressive),
            bounds(250, 5_000)
        );
        let cfg = RetryConfig {
            base_delay_ms: Some(10),
            ..RetryConfig::default()
        };
        assert_eq!(BackoffBounds::from_config(&cfg, OptimizationLevel::Conservative).base_delay_ms, 10);
    }
}
