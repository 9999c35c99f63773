//! Environment-based configuration types for registered client management.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;

/// Number of retries after a connection-level failure
#[derive(Clone, Copy, Debug)]
pub struct ConnectionRetryCount(u32);

/// Fixed delay between connection retries
#[derive(Clone, Copy, Debug)]
pub struct ConnectionRetryDelay(Duration);

/// Certificate bundles for HTTPS connections
#[derive(Clone, Debug)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone, Copy, Debug)]
pub struct HttpClientTimeout(Duration);

/// Main client configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub user_agent: String,
    pub certificate_bundles: CertificateBundles,
    pub http_client_timeout: HttpClientTimeout,
    pub connection_retry_count: ConnectionRetryCount,
    pub connection_retry_delay: ConnectionRetryDelay,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let certificate_bundles: CertificateBundles =
            optional_env("CERTIFICATE_BUNDLES").try_into()?;
        let default_user_agent = format!("aip-client-registration/{}", version()?);
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let connection_retry_count: ConnectionRetryCount =
            default_env("CONNECTION_RETRY_COUNT", "3").try_into()?;
        let connection_retry_delay: ConnectionRetryDelay =
            default_env("CONNECTION_RETRY_DELAY", "1s").try_into()?;

        Ok(Self {
            version: version()?,
            user_agent,
            certificate_bundles,
            http_client_timeout,
            connection_retry_count,
            connection_retry_delay,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for ConnectionRetryCount {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self::default());
        }
        value
            .trim()
            .parse::<u32>()
            .map(Self)
            .map_err(ConfigError::RetryCountParsingFailed)
    }
}

impl Default for ConnectionRetryCount {
    fn default() -> Self {
        Self(3)
    }
}

impl AsRef<u32> for ConnectionRetryCount {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

impl TryFrom<String> for ConnectionRetryDelay {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self::default());
        }
        duration_str::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
    }
}

impl Default for ConnectionRetryDelay {
    fn default() -> Self {
        Self(Duration::from_secs(1))
    }
}

impl AsRef<Duration> for ConnectionRetryDelay {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .filter_map(|s| {
                    if s.is_empty() {
                        None
                    } else {
                        Some(s.to_string())
                    }
                })
                .collect::<Vec<String>>(),
        ))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }
        duration_str::parse(&value)
            .map(Self)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}
