//! Handle over a dynamically registered client (RFC 7592).
//!
//! A [`RegisteredClient`] holds the registration endpoint, the registration access token
//! and the last metadata snapshot returned by the server. `read` and `update` never
//! modify a handle: a successful call returns a new one carrying the server's view of
//! the client, possibly with a rotated endpoint or token.

use http::{
    HeaderValue, Method,
    header::{ACCEPT, CONTENT_TYPE},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::merge::{check_immutable_fields, merge_metadata};
use super::metadata::{ClientMetadata, REGISTRATION_ACCESS_TOKEN, REGISTRATION_CLIENT_URI};
use crate::errors::{RegistrationError, Result};
use crate::http::context::ManagementContext;
use crate::http::pipeline::send_request;
use crate::http::transport::{OutgoingRequest, TransportResponse};

const APPLICATION_JSON: &str = "application/json";

/// A registered client and its client configuration endpoint.
pub struct RegisteredClient {
    context: Arc<ManagementContext>,
    registration_client_uri: Option<String>,
    registration_token: Option<String>,
    registered_metadata: ClientMetadata,
    closed: AtomicBool,
}

impl RegisteredClient {
    /// Handle over `registered_metadata`, managed through `registration_client_uri`
    /// with `registration_token` as the bearer token
    pub fn new(
        context: Arc<ManagementContext>,
        registered_metadata: ClientMetadata,
        registration_client_uri: Option<String>,
        registration_token: Option<String>,
    ) -> Self {
        Self {
            context,
            registration_client_uri,
            registration_token,
            registered_metadata,
            closed: AtomicBool::new(false),
        }
    }

    /// Copy of the current metadata snapshot
    pub fn metadata(&self) -> Result<ClientMetadata> {
        self.check_closed()?;
        Ok(self.registered_metadata.clone())
    }

    /// Client configuration endpoint, if the server returned one
    pub fn registration_uri(&self) -> Option<&str> {
        self.registration_client_uri.as_deref()
    }

    /// Registration access token, if the server returned one
    pub fn registration_token(&self) -> Option<&str> {
        self.registration_token.as_deref()
    }

    /// True once [`RegisteredClient::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Read the current client configuration from the server
    pub async fn read(&self) -> Result<RegisteredClient> {
        let uri = self.client_configuration_uri()?;

        let mut request = OutgoingRequest::new(Method::GET, uri);
        request.put_header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        let response = self.make_request(request, Vec::new()).await?;
        self.new_registered_client(response)
    }

    /// Update the client configuration.
    ///
    /// `new_metadata` may be partial: keys it does not define keep their current value.
    /// The client id and secret can not be changed.
    pub async fn update(&self, new_metadata: &ClientMetadata) -> Result<RegisteredClient> {
        let uri = self.client_configuration_uri()?;
        check_immutable_fields(&self.registered_metadata, new_metadata)?;

        tracing::debug!(metadata = %self.registered_metadata, "current client metadata");
        let json = merge_metadata(&self.registered_metadata, new_metadata);
        let body = serde_json::to_vec(&json)
            .map_err(|e| RegistrationError::InvalidMetadata(e.to_string()))?;
        tracing::debug!(
            metadata = %String::from_utf8_lossy(&body),
            "updated client metadata"
        );

        let mut request = OutgoingRequest::new(Method::PUT, uri);
        request.put_header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        request.put_header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        let response = self.make_request(request, body).await?;
        self.new_registered_client(response)
    }

    /// Delete the client registration.
    ///
    /// Only a `200 OK` is treated as a successful deletion, but a failed deletion is
    /// logged rather than returned.
    pub async fn delete(&self) -> Result<()> {
        let uri = self.client_configuration_uri()?;

        let request = OutgoingRequest::new(Method::DELETE, uri);
        let response = self.make_request(request, Vec::new()).await?;

        if response.status().as_u16() == 200 {
            tracing::debug!("client has been successfully deleted");
        } else {
            tracing::warn!(
                status = response.status().as_u16(),
                error_message = response.body_as_str(),
                "client delete request has failed"
            );
        }
        Ok(())
    }

    /// Release the transport. Repeated calls are no-ops and release failures are only
    /// logged.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.context.transport.close() {
            tracing::debug!(error = %err, "failed to close the registered client transport");
        }
    }

    async fn make_request(
        &self,
        request: OutgoingRequest,
        body: Vec<u8>,
    ) -> Result<TransportResponse> {
        send_request(
            &self.context,
            self.registration_token.as_deref(),
            request,
            body,
        )
        .await
    }

    fn new_registered_client(&self, response: TransportResponse) -> Result<RegisteredClient> {
        let status = response.status();
        if !status.is_success() {
            let error_message = response.body_as_str();
            tracing::debug!(
                status = status.as_u16(),
                error_message,
                "client configuration request has failed"
            );
            return Err(RegistrationError::RegistrationUpdate(
                error_message.to_string(),
            ));
        }

        let mut json = response
            .body_as_json_object()
            .map_err(|e| RegistrationError::InvalidResponse(e.to_string()))?;
        tracing::debug!(status = status.as_u16(), "client configuration has been read");

        let new_registration_client_uri = take_string(&mut json, REGISTRATION_CLIENT_URI);
        let new_registration_token = take_string(&mut json, REGISTRATION_ACCESS_TOKEN);

        Ok(RegisteredClient::new(
            self.context.clone(),
            ClientMetadata::new(json),
            new_registration_client_uri.or_else(|| self.registration_client_uri.clone()),
            new_registration_token.or_else(|| self.registration_token.clone()),
        ))
    }

    fn client_configuration_uri(&self) -> Result<String> {
        self.check_closed()?;
        self.registration_client_uri
            .clone()
            .ok_or(RegistrationError::NoManagementEndpoint)
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            Err(RegistrationError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for RegisteredClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredClient")
            .field("registration_client_uri", &self.registration_client_uri)
            .field(
                "registration_token",
                &self.registration_token.as_ref().map(|_| "redacted"),
            )
            .field("client_id", &self.registered_metadata.client_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Remove `key` from `json`; non-string values are dropped and treated as absent.
fn take_string(json: &mut serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match json.shift_remove(key) {
        Some(serde_json::Value::String(value)) => Some(value),
        Some(other) => {
            tracing::debug!(key, value = %other, "ignoring non-string registration property");
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::RetryPolicy;
    use crate::http::filters::{
        EndpointType, RequestContextProperties, RequestFilter, RequestFilters,
    };
    use crate::http::test_transport::{Outcome, RecordingTransport};
    use http::StatusCode;
    use serde_json::{Value, json};
    use std::time::Duration;

    const URI: &str = "https://auth.example.com/register/abc";

    fn current_metadata() -> ClientMetadata {
        ClientMetadata::from_json_str(
            r#"{"client_id":"abc","client_secret":"s3cret","client_id_issued_at":1700000000,"client_name":"App","redirect_uris":["https://app.example.com/cb"],"client_secret_expires_at":0}"#,
        )
        .unwrap()
    }

    fn registered_client(
        transport: Arc<RecordingTransport>,
        uri: Option<&str>,
    ) -> RegisteredClient {
        let context = ManagementContext::new(transport, RetryPolicy::new(3, Duration::from_secs(1)));
        RegisteredClient::new(
            Arc::new(context),
            current_metadata(),
            uri.map(str::to_string),
            Some("rat-1".to_string()),
        )
    }

    #[tokio::test]
    async fn test_read_returns_new_handle() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc","client_name":"Server Name","registration_client_uri":"https://auth.example.com/register/abc2","registration_access_token":"rat-2"}"#,
        )));
        let client = registered_client(transport.clone(), Some(URI));

        let updated = client.read().await.unwrap();

        assert_eq!(updated.registration_uri(), Some("https://auth.example.com/register/abc2"));
        assert_eq!(updated.registration_token(), Some("rat-2"));
        let metadata = updated.metadata().unwrap();
        assert_eq!(metadata.client_name(), Some("Server Name"));
        assert!(!metadata.contains_key(REGISTRATION_CLIENT_URI));
        assert!(!metadata.contains_key(REGISTRATION_ACCESS_TOKEN));

        // the issuing handle is untouched
        assert_eq!(client.registration_uri(), Some(URI));
        assert_eq!(client.metadata().unwrap().client_name(), Some("App"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].uri, URI);
        assert_eq!(requests[0].header("accept"), Some(APPLICATION_JSON));
        assert_eq!(requests[0].header("authorization"), Some("Bearer rat-1"));
        assert!(requests[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_read_keeps_prior_endpoint_and_token_when_omitted() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc"}"#,
        )));
        let client = registered_client(transport, Some(URI));

        let updated = client.read().await.unwrap();

        assert_eq!(updated.registration_uri(), Some(URI));
        assert_eq!(updated.registration_token(), Some("rat-1"));
    }

    #[tokio::test]
    async fn test_read_failure_carries_response_body() {
        let transport = Arc::new(RecordingTransport::always(Outcome::Respond(
            StatusCode::UNAUTHORIZED,
            r#"{"error":"invalid_token"}"#.to_string(),
        )));
        let client = registered_client(transport, Some(URI));

        let err = client.read().await.unwrap_err();

        match err {
            RegistrationError::RegistrationUpdate(message) => {
                assert_eq!(message, r#"{"error":"invalid_token"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_rejects_non_object_body() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("[]")));
        let client = registered_client(transport, Some(URI));

        let result = client.read().await;
        assert!(matches!(result, Err(RegistrationError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_update_sends_merged_metadata() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc","client_name":"Renamed","client_id_issued_at":1700000000}"#,
        )));
        let client = registered_client(transport.clone(), Some(URI));

        let new_metadata = ClientMetadata::builder()
            .client_name("Renamed")
            .property("logo_uri", "https://app.example.com/logo.png")
            .build();
        let updated = client.update(&new_metadata).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(requests[0].header("content-type"), Some(APPLICATION_JSON));
        assert_eq!(requests[0].header("accept"), Some(APPLICATION_JSON));
        assert_eq!(
            requests[0].body_str(),
            r#"{"client_id":"abc","client_secret":"s3cret","client_name":"Renamed","redirect_uris":["https://app.example.com/cb"],"logo_uri":"https://app.example.com/logo.png"}"#
        );

        // the server response is the new snapshot
        let metadata = updated.metadata().unwrap();
        assert_eq!(
            metadata.metadata_string(),
            r#"{"client_id":"abc","client_name":"Renamed","client_id_issued_at":1700000000}"#
        );
    }

    #[tokio::test]
    async fn test_update_with_new_client_id_makes_no_calls() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport.clone(), Some(URI));

        let new_metadata = ClientMetadata::builder().client_id("other").build();
        let result = client.update(&new_metadata).await;

        assert!(matches!(
            result,
            Err(RegistrationError::ImmutableFieldViolation(_))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_update_with_new_client_secret_makes_no_calls() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport.clone(), Some(URI));

        let new_metadata = ClientMetadata::builder().client_secret("rotated").build();
        let result = client.update(&new_metadata).await;

        assert!(matches!(
            result,
            Err(RegistrationError::ImmutableFieldViolation(_))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_update_with_non_string_identity_makes_no_calls() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport.clone(), Some(URI));

        let numeric_id = ClientMetadata::builder().property("client_id", 123).build();
        assert!(matches!(
            client.update(&numeric_id).await,
            Err(RegistrationError::ImmutableFieldViolation("Client id"))
        ));

        let null_secret = ClientMetadata::builder()
            .property("client_secret", Value::Null)
            .build();
        assert!(matches!(
            client.update(&null_secret).await,
            Err(RegistrationError::ImmutableFieldViolation("Client secret"))
        ));

        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_update_failure_carries_response_body() {
        let transport = Arc::new(RecordingTransport::always(Outcome::Respond(
            StatusCode::BAD_REQUEST,
            "invalid_redirect_uri".to_string(),
        )));
        let client = registered_client(transport, Some(URI));

        let new_metadata = ClientMetadata::builder()
            .redirect_uri("http://evil.example.com")
            .build();
        let err = client.update(&new_metadata).await.unwrap_err();

        assert!(matches!(err, RegistrationError::RegistrationUpdate(ref m) if m == "invalid_redirect_uri"));
        assert!(!err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_missing_endpoint_fails_without_calls() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport.clone(), None);

        assert!(matches!(
            client.read().await,
            Err(RegistrationError::NoManagementEndpoint)
        ));
        assert!(matches!(
            client.update(&ClientMetadata::default()).await,
            Err(RegistrationError::NoManagementEndpoint)
        ));
        assert!(matches!(
            client.delete().await,
            Err(RegistrationError::NoManagementEndpoint)
        ));
        assert_eq!(transport.request_count(), 0);
        assert!(client.metadata().is_ok());
    }

    #[tokio::test]
    async fn test_delete_success() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("")));
        let client = registered_client(transport.clone(), Some(URI));

        client.delete().await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::DELETE);
        assert!(requests[0].body.is_empty());
        assert_eq!(requests[0].header("authorization"), Some("Bearer rat-1"));
    }

    #[tokio::test]
    async fn test_delete_server_error_is_not_surfaced() {
        let transport = Arc::new(RecordingTransport::always(Outcome::Respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
        )));
        let client = registered_client(transport.clone(), Some(URI));

        assert!(client.delete().await.is_ok());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_surfaces_unavailable_server() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ConnectionFailure(
            "connection refused".to_string(),
        )));
        let client = registered_client(transport.clone(), Some(URI));

        assert!(matches!(
            client.delete().await,
            Err(RegistrationError::ServerUnavailable)
        ));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn test_operations_fail_after_close() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport.clone(), Some(URI));

        client.close();
        client.close();

        assert!(client.is_closed());
        assert_eq!(transport.close_calls(), 1);
        assert!(matches!(client.metadata(), Err(RegistrationError::Closed)));
        assert!(matches!(client.read().await, Err(RegistrationError::Closed)));
        assert!(matches!(
            client.update(&ClientMetadata::default()).await,
            Err(RegistrationError::Closed)
        ));
        assert!(matches!(client.delete().await, Err(RegistrationError::Closed)));
        assert_eq!(transport.request_count(), 0);

        // plain accessors stay available
        assert_eq!(client.registration_uri(), Some(URI));
        assert_eq!(client.registration_token(), Some("rat-1"));
    }

    #[tokio::test]
    async fn test_close_checks_before_endpoint() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let client = registered_client(transport, None);

        client.close();
        assert!(matches!(client.read().await, Err(RegistrationError::Closed)));
    }

    #[test]
    fn test_close_swallows_release_failure() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")).failing_close());
        let client = registered_client(transport.clone(), Some(URI));

        client.close();
        client.close();

        assert!(client.is_closed());
        assert_eq!(transport.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_derived_handles_are_independently_closable() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc"}"#,
        )));
        let client = registered_client(transport.clone(), Some(URI));
        let derived = client.read().await.unwrap();

        client.close();

        assert!(!derived.is_closed());
        assert!(derived.metadata().is_ok());
        assert!(derived.read().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_retries_connection_failures() {
        let transport = Arc::new(RecordingTransport::new(
            vec![Outcome::ConnectionFailure("connection reset".to_string())],
            Outcome::ok(r#"{"client_id":"abc"}"#),
        ));
        let client = registered_client(transport.clone(), Some(URI));

        let started = tokio::time::Instant::now();
        let updated = client.read().await.unwrap();

        assert_eq!(updated.metadata().unwrap().client_id(), Some("abc"));
        assert_eq!(transport.request_count(), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_read_stops_retrying() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ConnectionFailure(
            "connection refused".to_string(),
        )));
        let context = ManagementContext::new(
            transport.clone(),
            RetryPolicy::new(10, Duration::from_secs(1)),
        );
        let client = RegisteredClient::new(
            Arc::new(context),
            current_metadata(),
            Some(URI.to_string()),
            None,
        );

        let result = tokio::time::timeout(Duration::from_millis(1500), client.read()).await;
        assert!(result.is_err());
        assert_eq!(transport.request_count(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_reads_on_one_handle() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc"}"#,
        )));
        let client = registered_client(transport.clone(), Some(URI));

        let results = futures::future::join_all((0..4).map(|_| client.read())).await;

        assert!(results.iter().all(|result| result.is_ok()));
        assert_eq!(transport.request_count(), 4);
    }

    struct ClientIdFilter;

    impl RequestFilter for ClientIdFilter {
        fn filter(
            &self,
            request: &mut OutgoingRequest,
            body: &mut Vec<u8>,
            _properties: &mut RequestContextProperties,
        ) {
            request.put_header("x-body-length", HeaderValue::from(body.len()));
        }
    }

    #[tokio::test]
    async fn test_filters_see_outgoing_body() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok("{}")));
        let filters = RequestFilters::new()
            .with_filter(EndpointType::ClientConfiguration, Arc::new(ClientIdFilter));
        let context = ManagementContext::new(transport.clone(), RetryPolicy::default())
            .with_filters(filters);
        let client = RegisteredClient::new(
            Arc::new(context),
            ClientMetadata::builder().client_id("abc").build(),
            Some(URI.to_string()),
            None,
        );

        client
            .update(&ClientMetadata::builder().client_name("App").build())
            .await
            .unwrap();

        let requests = transport.requests();
        let expected = r#"{"client_id":"abc","client_name":"App"}"#;
        assert_eq!(requests[0].body_str(), expected);
        assert_eq!(
            requests[0].header("x-body-length"),
            Some(expected.len().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_private_properties_only_come_back_from_server() {
        let transport = Arc::new(RecordingTransport::always(Outcome::ok(
            r#"{"client_id":"abc","client_name":"App"}"#,
        )));
        let client = registered_client(transport.clone(), Some(URI));

        let updated = client
            .update(&ClientMetadata::builder().client_name("App").build())
            .await
            .unwrap();

        let sent: Value = serde_json::from_str(transport.requests()[0].body_str()).unwrap();
        assert!(sent.get("client_id_issued_at").is_none());
        assert!(sent.get("client_secret_expires_at").is_none());

        let metadata = updated.metadata().unwrap();
        assert!(!metadata.contains_key("client_id_issued_at"));
        assert_eq!(metadata.as_json_object(), json!({"client_id":"abc","client_name":"App"}).as_object().unwrap());
    }
}
