//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MIN_CLEANUP_INTERVAL};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `ttl_ms` is 0
    /// - `store_timeout_ms` is less than 100ms or exceeds 10 minutes
    /// - `api_base` or `user_agent` is empty
    /// - `index_path` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid { field: "ttl_ms".into(), reason: "must be greater than 0".into() });
        }
        if self.ttl_ms > i64::MAX as u64 {
            return Err(ConfigError::Invalid { field: "ttl_ms".into(), reason: "out of range".into() });
        }

        if self.store_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "store_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.store_timeout_ms > 600_000 {
            return Err(ConfigError::Invalid {
                field: "store_timeout_ms".into(),
                reason: "must not exceed 10 minutes (600000ms)".into(),
            });
        }

        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "api_base".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.index_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "index_path".into(), reason: "must not be empty".into() });
        }

        if (self.cleanup_interval_ms as u128) < MIN_CLEANUP_INTERVAL.as_millis() {
            tracing::warn!(
                configured_ms = self.cleanup_interval_ms,
                minimum_ms = MIN_CLEANUP_INTERVAL.as_millis() as u64,
                "cleanup_interval_ms below minimum; raising to minimum"
            );
        }

        if self.cache_max_bytes > 0 && self.cache_max_file_bytes > self.cache_max_bytes {
            tracing::warn!(
                cache_max_bytes = self.cache_max_bytes,
                cache_max_file_bytes = self.cache_max_file_bytes,
                "Per-item ceiling exceeds the global quota; \
                 a single admitted item can trigger quota eviction"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ttl_zero() {
        let config = AppConfig { ttl_ms: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ttl_ms"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { store_timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "store_timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { store_timeout_ms: 600_001, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "store_timeout_ms"));
    }

    #[test]
    fn test_validate_empty_api_base() {
        let config = AppConfig { api_base: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "api_base"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_short_interval_is_not_an_error() {
        let config = AppConfig { cleanup_interval_ms: 10, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_disabled_limits() {
        let config = AppConfig { cache_max_bytes: 0, cache_max_file_bytes: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
