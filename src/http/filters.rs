//! Request filters applied to outgoing client configuration requests.
//!
//! Filters are registered per [`EndpointType`] and run in registration order. They may
//! mutate the request headers and body in place before it is sent.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::transport::OutgoingRequest;

/// OpenID Connect endpoints a filter can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointType {
    Discovery,
    Token,
    TokenRevocation,
    Introspection,
    Jwks,
    UserInfo,
    ClientRegistration,
    ClientConfiguration,
}

/// Per-call properties shared between the filters of a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestContextProperties {
    properties: HashMap<String, Value>,
}

impl RequestContextProperties {
    /// Empty property bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Property value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Property value by name, when it is a JSON string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// Set a property, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// True when no property has been set
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Hook invoked before a request is sent
pub trait RequestFilter: Send + Sync {
    /// Inspect or modify the outgoing request and its body
    fn filter(
        &self,
        request: &mut OutgoingRequest,
        body: &mut Vec<u8>,
        properties: &mut RequestContextProperties,
    );
}

/// Request filters grouped by endpoint type
#[derive(Clone, Default)]
pub struct RequestFilters {
    filters: HashMap<EndpointType, Vec<Arc<dyn RequestFilter>>>,
}

impl RequestFilters {
    /// Empty filter registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter for an endpoint type; filters run in registration order
    pub fn register(&mut self, endpoint: EndpointType, filter: Arc<dyn RequestFilter>) {
        self.filters.entry(endpoint).or_default().push(filter);
    }

    /// Builder form of [`RequestFilters::register`]
    pub fn with_filter(mut self, endpoint: EndpointType, filter: Arc<dyn RequestFilter>) -> Self {
        self.register(endpoint, filter);
        self
    }

    /// Filters registered for the endpoint type, in registration order
    pub fn matching(&self, endpoint: EndpointType) -> &[Arc<dyn RequestFilter>] {
        self.filters
            .get(&endpoint)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// True when no filter is registered for any endpoint type
    pub fn is_empty(&self) -> bool {
        self.filters.values().all(Vec::is_empty)
    }

    /// Run the filters registered for `endpoint` with a fresh set of context properties
    pub fn apply(&self, endpoint: EndpointType, request: &mut OutgoingRequest, body: &mut Vec<u8>) {
        let matching = self.matching(endpoint);
        if matching.is_empty() {
            return;
        }
        let mut properties = RequestContextProperties::new();
        for filter in matching {
            filter.filter(request, body, &mut properties);
        }
    }
}

impl std::fmt::Debug for RequestFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&EndpointType, usize> =
            self.filters.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("RequestFilters")
            .field("filters", &counts)
            .finish()
    }
}
