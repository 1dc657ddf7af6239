//! Client configuration.

use std::time::Duration;

use serde::{
    Deserialize, Deserializer,
    de::{Error as _, Unexpected},
};
use thiserror::Error;

/// Environment variable holding the service root.
pub const ENV_URL: &str = "SALTAPI_URL";
/// Environment variable disabling certificate validation.
pub const ENV_IGNORE_SSL: &str = "SALTAPI_IGNORE_SSL";
/// Environment variable holding a cached token.
pub const ENV_TOKEN: &str = "SALTAPI_TOKEN";
/// Environment variable overriding the connect timeout (seconds).
pub const ENV_CONNECT_TIMEOUT: &str = "SALTAPI_CONNECT_TIMEOUT_SECS";
/// Environment variable setting a read timeout (seconds).
pub const ENV_READ_TIMEOUT: &str = "SALTAPI_READ_TIMEOUT_SECS";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Connection settings for a salt-api client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Service root, e.g. `https://salt.example.com:8000/`.
    pub api_url: String,
    /// Skip certificate validation (self-signed deployments).
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Per-read timeout. Unset by default so idle event streams stay open.
    /// Read from `read_timeout_secs`; zero is rejected.
    #[serde(
        rename = "read_timeout_secs",
        default,
        deserialize_with = "deserialize_read_timeout"
    )]
    pub read_timeout: Option<Duration>,
    /// Previously issued token used to seed the session.
    #[serde(default)]
    pub token: Option<String>,
}

const fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn deserialize_read_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<u64>::deserialize(deserializer)? {
        Some(0) => Err(D::Error::invalid_value(
            Unexpected::Unsigned(0),
            &"a positive number of seconds",
        )),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

impl ClientConfig {
    /// Create a config for `api_url` with defaults.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ignore_ssl_errors: false,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout: None,
            token: None,
        }
    }

    /// Disable certificate validation.
    #[must_use]
    pub fn ignore_ssl_errors(mut self, ignore: bool) -> Self {
        self.ignore_ssl_errors = ignore;
        self
    }

    /// Set the read timeout. A zero duration clears it.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Seed the session with a cached token.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout, if configured.
    #[must_use]
    pub const fn read_timeout_duration(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns error if `SALTAPI_URL` is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variables.
    ///
    /// # Errors
    /// Returns error if `SALTAPI_URL` is missing or a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup(ENV_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_URL))?;

        let mut config = Self::new(api_url);

        if let Some(value) = lookup(ENV_IGNORE_SSL) {
            config.ignore_ssl_errors = parse_bool(ENV_IGNORE_SSL, &value)?;
        }
        if let Some(value) = lookup(ENV_CONNECT_TIMEOUT) {
            config.connect_timeout_secs = parse_secs(ENV_CONNECT_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_READ_TIMEOUT) {
            let secs = parse_secs(ENV_READ_TIMEOUT, &value)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: ENV_READ_TIMEOUT,
                    value,
                });
            }
            config.read_timeout = Some(Duration::from_secs(secs));
        }
        config.token = lookup(ENV_TOKEN).filter(|t| !t.is_empty());

        Ok(config)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_owned(),
        }),
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_owned(),
    })
}
