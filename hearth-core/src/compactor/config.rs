use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HearthError, Result};

/// Configuration for the memory compactor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorConfig {
    /// Compact once the conversation exceeds this many characters (default: 8000)
    pub limit_chars: usize,

    /// Number of most recent turns kept verbatim across a rewrite (default: 8)
    pub keep_last: usize,

    /// Deadline for the summarization call (default: 2 minutes)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            limit_chars: 8000,
            keep_last: 8,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl CompactorConfig {
    /// Create a new compactor configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the character threshold above which compaction triggers.
    pub fn with_limit_chars(mut self, limit: usize) -> Self {
        self.limit_chars = limit.max(1); // Ensure a positive threshold
        self
    }

    /// Set how many recent turns survive a rewrite verbatim.
    pub fn with_keep_last(mut self, keep: usize) -> Self {
        self.keep_last = keep;
        self
    }

    /// Set the deadline for the summarization call.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check invariants on externally supplied values (e.g. deserialized
    /// configuration, which bypasses the builder clamps).
    pub fn validate(&self) -> Result<()> {
        if self.limit_chars == 0 {
            return Err(HearthError::Configuration(
                "limit_chars must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CompactorConfig::default();
        assert_eq!(config.limit_chars, 8000);
        assert_eq!(config.keep_last, 8);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_config_builder() {
        let config = CompactorConfig::new()
            .with_limit_chars(2000)
            .with_keep_last(4)
            .with_request_timeout(Duration::from_secs(30));

        assert_eq!(config.limit_chars, 2000);
        assert_eq!(config.keep_last, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_limit_chars_minimum() {
        let config = CompactorConfig::new().with_limit_chars(0);
        assert_eq!(config.limit_chars, 1);
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = CompactorConfig {
            limit_chars: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_serde_uses_humantime() {
        let config = CompactorConfig::new().with_request_timeout(Duration::from_secs(90));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"1m 30s\""));

        let parsed: CompactorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_timeout, Duration::from_secs(90));
    }
}
