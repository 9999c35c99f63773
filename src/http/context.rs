//! Shared request context for registered clients.

use std::sync::Arc;
use std::time::Duration;

use super::filters::RequestFilters;
use super::transport::Transport;
use crate::config::Config;

/// Retry behaviour for connection-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub connection_retry_count: u32,
    /// Fixed delay between attempts
    pub connection_retry_delay: Duration,
}

impl RetryPolicy {
    /// Retry policy with an explicit retry count and fixed delay
    pub fn new(connection_retry_count: u32, connection_retry_delay: Duration) -> Self {
        Self {
            connection_retry_count,
            connection_retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self::new(
            *config.connection_retry_count.as_ref(),
            *config.connection_retry_delay.as_ref(),
        )
    }
}

/// Transport, retry policy and request filters shared by every handle derived from
/// the same registration.
#[derive(Clone)]
pub struct ManagementContext {
    pub transport: Arc<dyn Transport>,
    pub retry_policy: RetryPolicy,
    pub filters: RequestFilters,
}

impl ManagementContext {
    /// Context with no request filters
    pub fn new(transport: Arc<dyn Transport>, retry_policy: RetryPolicy) -> Self {
        Self {
            transport,
            retry_policy,
            filters: RequestFilters::default(),
        }
    }

    /// Replace the request filters applied by every request
    pub fn with_filters(mut self, filters: RequestFilters) -> Self {
        self.filters = filters;
        self
    }
}
