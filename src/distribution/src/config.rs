//! Redistribution timing

use crate::error::{DistributionError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry timing for unacknowledged distributions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionConfig {
    /// How often the scheduler scans for stalled distributions
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Delay before the first retry of a send
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,

    /// Upper bound for the doubling retry delay
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

fn default_scan_interval_ms() -> u64 { 1_000 }
fn default_initial_retry_delay_ms() -> u64 { 10_000 }
fn default_max_retry_delay_ms() -> u64 { 300_000 }

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl RedistributionConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    /// Delay after the `attempts`-th send: the initial delay doubled per
    /// previous attempt, clamped to the maximum
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32);
        let delay = self.initial_retry_delay_ms.saturating_mul(1u64 << exponent);
        self.clamp_delay(Duration::from_millis(delay))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_ms == 0 || self.initial_retry_delay_ms == 0 {
            return Err(DistributionError::Configuration(
                "scan interval and initial retry delay must be positive".into(),
            ));
        }
        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(DistributionError::Configuration(
                "max retry delay must not be below the initial retry delay".into(),
            ));
        }
        Ok(())
    }

    fn clamp_delay(&self, delay: Duration) -> Duration {
        let min = Duration::from_millis(self.initial_retry_delay_ms);
        let max = Duration::from_millis(self.max_retry_delay_ms);
        if delay < min {
            min
        } else if delay > max {
            max
        } else {
            delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_clamps() {
        let config = RedistributionConfig {
            scan_interval_ms: 100,
            initial_retry_delay_ms: 1_000,
            max_retry_delay_ms: 5_000,
        };

        assert_eq!(config.retry_delay(1), Duration::from_millis(1_000));
        assert_eq!(config.retry_delay(2), Duration::from_millis(2_000));
        assert_eq!(config.retry_delay(3), Duration::from_millis(4_000));
        assert_eq!(config.retry_delay(4), Duration::from_millis(5_000));
        assert_eq!(config.retry_delay(60), Duration::from_millis(5_000));
        assert_eq!(config.retry_delay(0), Duration::from_millis(1_000));
    }

    #[test]
    fn test_validate() {
        assert!(RedistributionConfig::default().validate().is_ok());

        let config = RedistributionConfig {
            max_retry_delay_ms: 1,
            ..RedistributionConfig::default()
        };
        assert!(matches!(config.validate(), Err(DistributionError::Configuration(_))));
    }
}
