//! Standardized error types following the `error-aip-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur while loading runtime settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when version information is not available
    #[error("error-aip-config-1 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when CONNECTION_RETRY_COUNT cannot be parsed
    #[error("error-aip-config-2 Parsing CONNECTION_RETRY_COUNT into u32 failed: {0:?}")]
    RetryCountParsingFailed(std::num::ParseIntError),

    /// Error when a duration string (timeout or retry delay) cannot be parsed
    #[error("error-aip-config-3 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),
}

/// Errors raised by a [`Transport`](crate::http::Transport) implementation.
///
/// Only [`TransportError::ConnectionFailed`] is considered transient by the
/// request pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established or was reset
    #[error("error-aip-transport-1 Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request failed after a connection was made
    #[error("error-aip-transport-2 Request failed: {0}")]
    RequestFailed(String),

    /// The request URI is not an absolute URI
    #[error("error-aip-transport-3 Invalid request URI: {0}")]
    InvalidUri(String),

    /// The transport has been released
    #[error("error-aip-transport-4 Transport is closed")]
    Closed,

    /// Releasing the transport failed
    #[error("error-aip-transport-5 Failed to release transport: {0}")]
    ReleaseFailed(String),
}

impl TransportError {
    /// Returns true for connection-level failures that may be retried.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, TransportError::ConnectionFailed(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::RequestFailed(err.to_string())
        }
    }
}

/// Registered client management errors
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Operation attempted after the registered client was closed
    #[error("error-aip-registration-1 Registered client is closed")]
    Closed,

    /// The server did not grant a client configuration endpoint
    #[error(
        "error-aip-registration-2 Registered client can not make requests to the client configuration endpoint"
    )]
    NoManagementEndpoint,

    /// An update attempted to change an immutable identity field
    #[error("error-aip-registration-3 {0} can not be modified")]
    ImmutableFieldViolation(&'static str),

    /// The registration server could not be reached
    #[error("error-aip-registration-4 Registration server is not available")]
    ServerUnavailable,

    /// The registration server rejected the request; carries the response body
    #[error("error-aip-registration-5 {0}")]
    RegistrationUpdate(String),

    /// A successful response did not carry a JSON object
    #[error("error-aip-registration-6 Invalid client configuration response: {0}")]
    InvalidResponse(String),

    /// Client metadata could not be parsed
    #[error("error-aip-registration-7 Invalid client metadata: {0}")]
    InvalidMetadata(String),

    /// The registration access token can not be sent as a header value
    #[error("error-aip-registration-8 Registration access token is not a valid header value")]
    InvalidRegistrationToken,
}

pub type Result<T> = std::result::Result<T, RegistrationError>;
