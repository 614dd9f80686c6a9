//! Service configuration
//!
//! Defaults can be overridden by `SCHEDULING_*` environment variables, e.g.
//! `SCHEDULING_WEEKLY_QUOTA=5`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Scheduling service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Minimum number of days between today and the session date
    pub advance_days: i64,
    /// Maximum active sessions a user may book per calendar week
    pub weekly_quota: u32,
    /// Upper bound for one storage call in milliseconds
    pub store_timeout_ms: u64,
    /// Pause before retrying a transient storage failure in milliseconds
    pub retry_backoff_ms: u64,
    /// How long the booked-slots projection stays cached
    pub booked_slots_ttl_secs: u64,
    /// Where session events are POSTed; events are only logged when unset
    #[serde(default)]
    pub notification_webhook_url: Option<String>,
}

impl SchedulingConfig {
    /// Load configuration from defaults and the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: SchedulingConfig = Config::builder()
            .set_default("bind_address", "0.0.0.0:3002")?
            .set_default("advance_days", 7)?
            .set_default("weekly_quota", 3)?
            .set_default("store_timeout_ms", 3000)?
            .set_default("retry_backoff_ms", 100)?
            .set_default("booked_slots_ttl_secs", 30)?
            .add_source(Environment::with_prefix("SCHEDULING").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.advance_days < 0 {
            return Err(ConfigError::Message(
                "advance_days cannot be negative".to_string(),
            ));
        }
        if self.weekly_quota == 0 {
            return Err(ConfigError::Message(
                "weekly_quota must be at least 1".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "store_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.store_timeout_ms),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn booked_slots_ttl(&self) -> Duration {
        Duration::from_secs(self.booked_slots_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 4] = [
        "SCHEDULING_WEEKLY_QUOTA",
        "SCHEDULING_ADVANCE_DAYS",
        "SCHEDULING_STORE_TIMEOUT_MS",
        "SCHEDULING_NOTIFICATION_WEBHOOK_URL",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();

        let config = SchedulingConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3002");
        assert_eq!(config.advance_days, 7);
        assert_eq!(config.weekly_quota, 3);
        assert_eq!(config.notification_webhook_url, None);
        assert_eq!(config.retry_policy().timeout, Duration::from_secs(3));
        assert_eq!(config.booked_slots_ttl(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear();
        unsafe {
            env::set_var("SCHEDULING_WEEKLY_QUOTA", "5");
            env::set_var("SCHEDULING_ADVANCE_DAYS", "2");
            env::set_var("SCHEDULING_NOTIFICATION_WEBHOOK_URL", "http://localhost:9000/hooks");
        }

        let config = SchedulingConfig::from_env().unwrap();
        assert_eq!(config.weekly_quota, 5);
        assert_eq!(config.advance_days, 2);
        assert_eq!(
            config.notification_webhook_url.as_deref(),
            Some("http://localhost:9000/hooks")
        );

        clear();
    }

    #[test]
    #[serial]
    fn test_rejects_zero_timeout() {
        clear();
        unsafe {
            env::set_var("SCHEDULING_STORE_TIMEOUT_MS", "0");
        }

        assert!(SchedulingConfig::from_env().is_err());

        clear();
    }
}
