//! Request pipeline for the client configuration endpoint.
//!
//! Every request gets the registration access token as a bearer credential, passes
//! through the filters registered for [`EndpointType::ClientConfiguration`], and is
//! retried with a fixed delay while the transport reports connection-level failures.

use http::{HeaderValue, header::AUTHORIZATION};

use super::context::ManagementContext;
use super::filters::EndpointType;
use super::transport::{OutgoingRequest, TransportResponse};
use crate::errors::{RegistrationError, Result};

const BEARER_SCHEME: &str = "Bearer";

/// Send a request to the client configuration endpoint.
///
/// HTTP error statuses are returned as responses and never retried. Transport failures
/// surface as [`RegistrationError::ServerUnavailable`]; the cause is only logged.
pub(crate) async fn send_request(
    context: &ManagementContext,
    registration_token: Option<&str>,
    mut request: OutgoingRequest,
    mut body: Vec<u8>,
) -> Result<TransportResponse> {
    if let Some(token) = registration_token {
        let mut value = HeaderValue::from_str(&format!("{} {}", BEARER_SCHEME, token))
            .map_err(|_| RegistrationError::InvalidRegistrationToken)?;
        value.set_sensitive(true);
        request.put_header(AUTHORIZATION, value);
    }

    context
        .filters
        .apply(EndpointType::ClientConfiguration, &mut request, &mut body);

    let retry_policy = context.retry_policy;
    let mut retries: u32 = 0;
    loop {
        match context.transport.send(&request, &body).await {
            Ok(response) => return Ok(response),
            Err(err)
                if err.is_connection_failure()
                    && retries < retry_policy.connection_retry_count =>
            {
                retries += 1;
                tracing::debug!(
                    error = %err,
                    retries,
                    uri = %request.uri,
                    "connection to registration server failed, retrying"
                );
                tokio::time::sleep(retry_policy.connection_retry_delay).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, uri = %request.uri, "registration server is not available");
                return Err(RegistrationError::ServerUnavailable);
            }
        }
    }
}
