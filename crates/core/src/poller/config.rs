//! Polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the task and batch pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status checks (milliseconds).
    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    /// Consecutive transient failures tolerated before a poll gives up.
    /// 0 means the first network failure is terminal.
    #[serde(default)]
    pub max_transient_retries: u32,
}

fn default_interval() -> u64 {
    2000 // 2 seconds
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval(),
            max_transient_retries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PollingConfig::default();
        assert_eq!(config.interval_ms, 2000);
        assert_eq!(config.interval(), Duration::from_secs(2));
        assert_eq!(config.max_transient_retries, 0);
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: PollingConfig = toml::from_str("interval_ms = 100").unwrap();
        assert_eq!(config.interval_ms, 100);
        assert_eq!(config.max_transient_retries, 0);
    }
}
