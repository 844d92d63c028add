//! Save pipeline configuration.
//!
//! Environment variables read by [`SyncConfig::from_env`]:
//!
//! | Variable                      | Field               | Default                 |
//! |-------------------------------|---------------------|-------------------------|
//! | `QUIRE_API_URL`               | `api_url`           | `http://127.0.0.1:8000` |
//! | `QUIRE_STORE_URL`             | `store_url`         | `http://127.0.0.1:54321`|
//! | `QUIRE_STORE_KEY`             | `store_key`         | empty                   |
//! | `QUIRE_TOKEN`                 | `access_token`      | empty                   |
//! | `QUIRE_USER_ID`               | `user_id`           | nil UUID                |
//! | `QUIRE_DEBOUNCE_MS`           | `debounce`          | 2000                    |
//! | `QUIRE_CHECKPOINT_SECS`       | `checkpoint_interval` | 300                   |
//! | `QUIRE_REQUEST_TIMEOUT_SECS`  | `request_timeout`   | 30                      |
//! | `QUIRE_QUEUE_CAPACITY`        | `queue_capacity`    | 10000                   |

use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Configuration for one save pipeline.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend API base URL (`/documents/{id}/...` is appended)
    pub api_url: String,
    /// Data-store REST base URL used by the direct-write fallback
    pub store_url: String,
    /// Data-store API key (sent as `apikey`)
    pub store_key: String,
    /// Bearer token for both paths
    pub access_token: String,
    /// User recorded as `last_edited_by`
    pub user_id: Uuid,
    /// Quiet window before a burst of edits is saved
    pub debounce: Duration,
    /// Minimum time between automatic revision checkpoints
    pub checkpoint_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Maximum queued offline saves
    pub queue_capacity: usize,
    /// Summary attached to automatic checkpoints
    pub checkpoint_summary: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            store_url: "http://127.0.0.1:54321".to_string(),
            store_key: String::new(),
            access_token: String::new(),
            user_id: Uuid::nil(),
            debounce: Duration::from_millis(2000),
            checkpoint_interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
            queue_capacity: 10_000,
            checkpoint_summary: "Auto-saved checkpoint".to_string(),
        }
    }
}

impl SyncConfig {
    /// Config for tests: both paths pointed at one local server, short timeout.
    pub fn for_testing(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_url: base_url.clone(),
            store_url: base_url,
            store_key: "test-anon-key".to_string(),
            access_token: "test-token".to_string(),
            user_id: Uuid::new_v4(),
            request_timeout: Duration::from_secs(2),
            queue_capacity: 64,
            ..Self::default()
        }
    }

    /// Build from `QUIRE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("QUIRE_API_URL") {
            config.api_url = v;
        }
        if let Some(v) = lookup("QUIRE_STORE_URL") {
            config.store_url = v;
        }
        if let Some(v) = lookup("QUIRE_STORE_KEY") {
            config.store_key = v;
        }
        if let Some(v) = lookup("QUIRE_TOKEN") {
            config.access_token = v;
        }
        if let Some(v) = lookup("QUIRE_USER_ID") {
            config.user_id = parse("QUIRE_USER_ID", v)?;
        }
        if let Some(v) = lookup("QUIRE_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(parse("QUIRE_DEBOUNCE_MS", v)?);
        }
        if let Some(v) = lookup("QUIRE_CHECKPOINT_SECS") {
            config.checkpoint_interval = Duration::from_secs(parse("QUIRE_CHECKPOINT_SECS", v)?);
        }
        if let Some(v) = lookup("QUIRE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse("QUIRE_REQUEST_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = lookup("QUIRE_QUEUE_CAPACITY") {
            config.queue_capacity = parse("QUIRE_QUEUE_CAPACITY", v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce.is_zero() {
            return Err(ConfigError::Zero("debounce"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce, Duration::from_secs(2));
        assert_eq!(config.checkpoint_interval, Duration::from_secs(300));
        config.validate().unwrap();
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("QUIRE_API_URL", "https://api.example.org"),
            ("QUIRE_DEBOUNCE_MS", "1500"),
            ("QUIRE_QUEUE_CAPACITY", " 12 "),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.org");
        assert_eq!(config.debounce, Duration::from_millis(1500));
        assert_eq!(config.queue_capacity, 12);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_number() {
        let err = SyncConfig::from_lookup(lookup(&[("QUIRE_DEBOUNCE_MS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "QUIRE_DEBOUNCE_MS",
                value: "soon".into()
            }
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[("QUIRE_QUEUE_CAPACITY", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero("queue_capacity"));
    }
}
