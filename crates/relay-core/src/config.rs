//! Relay configuration
//!
//! Loaded from TOML; every field is optional and defaults to the standard
//! policy:
//!
//! ```toml
//! urgency_threshold = 1000
//! rate_limit_window_secs = 80
//! idle_flush_delay_secs = 8
//! pending_key = "user_changes_batch"
//! last_dispatch_key = "last_batch_time"
//! max_cas_attempts = 64
//! ```

use crate::error::ConfigError;
use chrono::Duration;
use relay_scheduler::{
    SchedulerPolicy, IDLE_FLUSH_DELAY_SECS, RATE_LIMIT_WINDOW_SECS, URGENCY_THRESHOLD,
};
use relay_store::{BatchKeys, DEFAULT_MAX_CAS_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest accepted window or delay (one week)
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Pending records that force a flush
    pub urgency_threshold: usize,
    /// Minimum seconds between non-urgent flushes
    pub rate_limit_window_secs: u64,
    /// Grace seconds before an idle-queue flush runs
    pub idle_flush_delay_secs: u64,
    /// Store key of the pending batch
    pub pending_key: String,
    /// Store key of the last dispatch time
    pub last_dispatch_key: String,
    /// Compare-and-swap attempts before giving up
    pub max_cas_attempts: usize,
}

impl RelayConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.urgency_threshold == 0 {
            return Err(ConfigError::Invalid(
                "urgency_threshold must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("rate_limit_window_secs", self.rate_limit_window_secs),
            ("idle_flush_delay_secs", self.idle_flush_delay_secs),
        ] {
            if secs > MAX_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not exceed {MAX_INTERVAL_SECS}"
                )));
            }
        }
        if self.pending_key.is_empty() || self.last_dispatch_key.is_empty() {
            return Err(ConfigError::Invalid("store keys must not be empty".to_string()));
        }
        if self.pending_key == self.last_dispatch_key {
            return Err(ConfigError::Invalid(
                "pending_key and last_dispatch_key must differ".to_string(),
            ));
        }
        if self.max_cas_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_cas_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Scheduler policy described by this config
    ///
    /// # Errors
    /// `ConfigError::Invalid` if the config does not validate
    pub fn scheduler_policy(&self) -> Result<SchedulerPolicy, ConfigError> {
        self.validate()?;
        Ok(SchedulerPolicy::new()
            .with_urgency_threshold(self.urgency_threshold)
            .with_rate_limit_window(seconds(self.rate_limit_window_secs))
            .with_idle_flush_delay(seconds(self.idle_flush_delay_secs)))
    }

    /// Store keys described by this config
    #[inline]
    #[must_use]
    pub fn batch_keys(&self) -> BatchKeys {
        BatchKeys::new(self.pending_key.clone(), self.last_dispatch_key.clone())
    }

    /// With urgency threshold
    #[inline]
    #[must_use]
    pub fn with_urgency_threshold(mut self, threshold: usize) -> Self {
        self.urgency_threshold = threshold;
        self
    }

    /// With rate-limit window
    #[inline]
    #[must_use]
    pub fn with_rate_limit_window_secs(mut self, secs: u64) -> Self {
        self.rate_limit_window_secs = secs;
        self
    }

    /// With idle flush delay
    #[inline]
    #[must_use]
    pub fn with_idle_flush_delay_secs(mut self, secs: u64) -> Self {
        self.idle_flush_delay_secs = secs;
        self
    }

    /// With store keys
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, pending: impl Into<String>, last_dispatch: impl Into<String>) -> Self {
        self.pending_key = pending.into();
        self.last_dispatch_key = last_dispatch.into();
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        let keys = BatchKeys::default();
        Self {
            urgency_threshold: URGENCY_THRESHOLD,
            rate_limit_window_secs: RATE_LIMIT_WINDOW_SECS.unsigned_abs(),
            idle_flush_delay_secs: IDLE_FLUSH_DELAY_SECS.unsigned_abs(),
            pending_key: keys.pending,
            last_dispatch_key: keys.last_dispatch,
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
        }
    }
}

// Callers validate against MAX_INTERVAL_SECS first, which fits in i64.
fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(MAX_INTERVAL_SECS)).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_policy_constants() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());

        let policy = config.scheduler_policy().unwrap();
        assert_eq!(policy, SchedulerPolicy::default());
        assert_eq!(config.batch_keys(), BatchKeys::default());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = RelayConfig::from_toml_str("urgency_threshold = 50\n").unwrap();
        assert_eq!(config.urgency_threshold, 50);
        assert_eq!(config.rate_limit_window_secs, 80);
        assert_eq!(config.pending_key, "user_changes_batch");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RelayConfig::from_toml_str("batch_size = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RelayConfig::new().with_urgency_threshold(0).validate().is_err());
        assert!(RelayConfig::new()
            .with_rate_limit_window_secs(MAX_INTERVAL_SECS + 1)
            .validate()
            .is_err());
        assert!(RelayConfig::new().with_keys("same", "same").validate().is_err());
        assert!(RelayConfig::new().with_keys("", "last").validate().is_err());
    }

    #[test]
    fn config_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rate_limit_window_secs = 30").unwrap();
        writeln!(file, "idle_flush_delay_secs = 2").unwrap();

        let config = RelayConfig::from_file(file.path()).unwrap();
        let policy = config.scheduler_policy().unwrap();
        assert_eq!(policy.rate_limit_window, Duration::seconds(30));
        assert_eq!(policy.idle_flush_delay, Duration::seconds(2));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = RelayConfig::from_file("/nonexistent/relay.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/relay.toml"));
    }
}
