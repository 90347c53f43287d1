use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{DEFAULT_FEED_LIMIT, DEFAULT_MDA_TIMEOUT_SECS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Search API
    pub api_url: String,
    pub feed_limit: u32,
    pub api_timeout: Duration,
    pub api_max_attempts: u32,
    pub api_retry_backoff: Duration,

    // Delivery
    pub mda_command: String,
    pub mda_timeout: Duration,
    pub mail_domain: String,

    // Cursor store
    pub database_path: PathBuf,

    // Scheduling
    pub poll_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Search API
            api_url: env_or_default("HN_API_URL", "http://api.thriftdb.com/api.hnsearch.com"),
            feed_limit: parse_env_u32("FEED_LIMIT", DEFAULT_FEED_LIMIT)?,
            api_timeout: Duration::from_secs(parse_env_u64("API_TIMEOUT_SECS", 30)?),
            api_max_attempts: parse_env_u32("API_MAX_ATTEMPTS", 3)?,
            api_retry_backoff: Duration::from_millis(parse_env_u64("API_RETRY_BACKOFF_MS", 500)?),

            // Delivery
            mda_command: env_or_default("MDA_COMMAND", "procmail"),
            mda_timeout: Duration::from_secs(parse_env_u64(
                "MDA_TIMEOUT_SECS",
                DEFAULT_MDA_TIMEOUT_SECS,
            )?),
            mail_domain: env_or_default("MAIL_DOMAIN", "example.com"),

            // Cursor store
            database_path: PathBuf::from(env_or_default(
                "DATABASE_PATH",
                "./data/hn-mail-gateway.sqlite",
            )),

            // Scheduling
            poll_interval: optional_env("POLL_INTERVAL_SECS")
                .map(|_| parse_env_u64("POLL_INTERVAL_SECS", 0))
                .transpose()?
                .map(Duration::from_secs),
        })
    }

    /// Defaults suitable for tests: no backoff, a single attempt, and a
    /// delivery command that discards its input.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_url: "http://127.0.0.1:9".to_string(),
            feed_limit: DEFAULT_FEED_LIMIT,
            api_timeout: Duration::from_secs(5),
            api_max_attempts: 1,
            api_retry_backoff: Duration::ZERO,
            mda_command: "cat > /dev/null".to_string(),
            mda_timeout: Duration::from_secs(5),
            mail_domain: "example.com".to_string(),
            database_path: PathBuf::from(":memory:"),
            poll_interval: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed_limit == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FEED_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.api_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "API_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.mda_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "MDA_COMMAND".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.mda_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "MDA_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue {
                name: "POLL_INTERVAL_SECS".to_string(),
                message: "must be at least 1 when set".to_string(),
            });
        }
        match url::Url::parse(&self.api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidValue {
                    name: "HN_API_URL".to_string(),
                    message: format!("unsupported scheme '{}'", url.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "HN_API_URL".to_string(),
                    message: e.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
