//! HTTP transport abstraction used to reach the client configuration endpoint.
//!
//! The registered client only needs absolute-URI requests carrying headers and a byte
//! body, and a response exposing the status code and body text. [`ReqwestTransport`]
//! is the production implementation.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header::IntoHeaderName};
use serde_json::{Map, Value};
use std::sync::RwLock;
use url::Url;

use crate::config::Config;
use crate::errors::TransportError;

/// Outgoing request prepared by the request pipeline.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

impl OutgoingRequest {
    /// Request without headers for `method` and `uri`
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Insert or replace a header.
    pub fn put_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.insert(name, value);
    }
}

/// Response returned by a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportResponse {
    status: StatusCode,
    body: String,
}

impl TransportResponse {
    /// Response with the given status and body
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status of the response
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body as text
    pub fn body_as_str(&self) -> &str {
        &self.body
    }

    /// Parse the body as a JSON object, keeping the server's key order.
    pub fn body_as_json_object(&self) -> Result<Map<String, Value>, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Transport used by registered clients.
///
/// Implementations report connection-level failures with
/// [`TransportError::ConnectionFailed`] so the pipeline can retry them; any HTTP status,
/// including error statuses, is a successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request with the given body
    async fn send(
        &self,
        request: &OutgoingRequest,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError>;

    /// Release the underlying resources
    fn close(&self) -> Result<(), TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
pub struct ReqwestTransport {
    client: RwLock<Option<reqwest::Client>>,
}

impl ReqwestTransport {
    /// Transport over an already configured reqwest client
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    /// Build the HTTP client from certificate bundles, user agent and timeout settings
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut client_builder = reqwest::Client::builder();
        for ca_certificate in config.certificate_bundles.as_ref() {
            tracing::info!("Loading CA certificate: {:?}", ca_certificate);
            let cert = std::fs::read(ca_certificate)?;
            let cert = reqwest::Certificate::from_pem(&cert)?;
            client_builder = client_builder.add_root_certificate(cert);
        }

        let client = client_builder
            .user_agent(config.user_agent.clone())
            .timeout(*config.http_client_timeout.as_ref())
            .build()?;
        Ok(Self::new(client))
    }

    fn current_client(&self) -> Result<reqwest::Client, TransportError> {
        let guard = self
            .client
            .read()
            .map_err(|_| TransportError::RequestFailed("transport lock poisoned".to_string()))?;
        guard.clone().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutgoingRequest,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let client = self.current_client()?;
        let url = Url::parse(&request.uri)
            .map_err(|e| TransportError::InvalidUri(format!("{}: {}", request.uri, e)))?;

        let response = client
            .request(request.method.clone(), url)
            .headers(request.headers.clone())
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok(TransportResponse::new(status, body))
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut guard = self
            .client
            .write()
            .map_err(|_| TransportError::ReleaseFailed("transport lock poisoned".to_string()))?;
        guard.take();
        Ok(())
    }
}
