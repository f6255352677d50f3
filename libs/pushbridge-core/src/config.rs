use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PushError, Result};

/// Dispatcher timing and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Delay between queue processing ticks in milliseconds (default: 800)
    pub request_interval_ms: u64,
    /// Ticks to wait for a response before giving up on it (default: 3)
    pub response_timeout_ticks: u32,
    /// How many times a queued request is retried (default: 1)
    pub max_retry_count: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: 800,
            response_timeout_ticks: 3,
            max_retry_count: 1,
        }
    }
}

impl DispatcherConfig {
    /// Reads the `PUSHBRIDGE_*` overrides, falling back to the defaults
    /// for unset variables. A variable that is set but not a number is a
    /// configuration error rather than a silent default.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            request_interval_ms: read_env(
                "PUSHBRIDGE_REQUEST_INTERVAL_MS",
                defaults.request_interval_ms,
            )?,
            response_timeout_ticks: read_env(
                "PUSHBRIDGE_RESPONSE_TIMEOUT_TICKS",
                defaults.response_timeout_ticks,
            )?,
            max_retry_count: read_env("PUSHBRIDGE_MAX_RETRY_COUNT", defaults.max_retry_count)?,
        })
    }
}

fn read_env<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| PushError::Config(format!("{name} must be a number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}
