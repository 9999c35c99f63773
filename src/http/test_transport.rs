//! Scripted transport that records every request it receives.

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::transport::{OutgoingRequest, Transport, TransportResponse};
use crate::errors::TransportError;

#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Respond(StatusCode, String),
    ConnectionFailure(String),
    RequestFailure(String),
}

impl Outcome {
    pub(crate) fn ok(body: &str) -> Self {
        Outcome::Respond(StatusCode::OK, body.to_string())
    }

    fn into_result(self) -> Result<TransportResponse, TransportError> {
        match self {
            Outcome::Respond(status, body) => Ok(TransportResponse::new(status, body)),
            Outcome::ConnectionFailure(msg) => Err(TransportError::ConnectionFailed(msg)),
            Outcome::RequestFailure(msg) => Err(TransportError::RequestFailed(msg)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub(crate) fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.to_str().unwrap())
    }
}

pub(crate) struct RecordingTransport {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    requests: Mutex<Vec<RecordedRequest>>,
    close_calls: AtomicUsize,
    fail_close: bool,
}

impl RecordingTransport {
    /// Play `script` in order, then answer every further request with `fallback`
    pub(crate) fn new(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            fail_close: false,
        }
    }

    pub(crate) fn always(outcome: Outcome) -> Self {
        Self::new(Vec::new(), outcome)
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        request: &OutgoingRequest,
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method.clone(),
            uri: request.uri.clone(),
            headers: request.headers.clone(),
            body: body.to_vec(),
        });
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        outcome.into_result()
    }

    fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(TransportError::ReleaseFailed("socket already gone".to_string()))
        } else {
            Ok(())
        }
    }
}
