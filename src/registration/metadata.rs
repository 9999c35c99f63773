//! Client metadata document (RFC 7591 section 2) with stable key order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RegistrationError, Result};

pub const CLIENT_ID: &str = "client_id";
pub const CLIENT_SECRET: &str = "client_secret";
pub const CLIENT_NAME: &str = "client_name";
pub const REDIRECT_URIS: &str = "redirect_uris";
pub const POST_LOGOUT_REDIRECT_URIS: &str = "post_logout_redirect_uris";
pub const GRANT_TYPES: &str = "grant_types";
pub const RESPONSE_TYPES: &str = "response_types";
pub const SCOPE: &str = "scope";
pub const TOKEN_ENDPOINT_AUTH_METHOD: &str = "token_endpoint_auth_method";
pub const CLIENT_ID_ISSUED_AT: &str = "client_id_issued_at";
pub const CLIENT_SECRET_EXPIRES_AT: &str = "client_secret_expires_at";
pub const REGISTRATION_CLIENT_URI: &str = "registration_client_uri";
pub const REGISTRATION_ACCESS_TOKEN: &str = "registration_access_token";

/// Registered client metadata.
///
/// An ordered JSON object: keys keep the order in which the server (or the builder)
/// produced them. Instances are never modified in place; use
/// [`ClientMetadata::builder`] or [`ClientMetadata::from_json_str`] to produce new ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientMetadata(Map<String, Value>);

impl ClientMetadata {
    /// Wrap an already parsed JSON object
    pub fn new(json: Map<String, Value>) -> Self {
        Self(json)
    }

    /// Parse metadata from JSON text; the document must be a JSON object
    pub fn from_json_str(metadata: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(metadata)
            .map_err(|e| RegistrationError::InvalidMetadata(e.to_string()))?;
        match value {
            Value::Object(json) => Ok(Self(json)),
            other => Err(RegistrationError::InvalidMetadata(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Builder for partial metadata, typically an update
    pub fn builder() -> ClientMetadataBuilder {
        ClientMetadataBuilder::default()
    }

    /// Compact JSON text of the document
    pub fn metadata_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Borrow the underlying JSON object
    pub fn as_json_object(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the metadata and return the JSON object
    pub fn into_json_object(self) -> Map<String, Value> {
        self.0
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Value for `key`, when it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// True when `key` is present, even with a `null` value
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `client_id`, when it is a string
    pub fn client_id(&self) -> Option<&str> {
        self.get_str(CLIENT_ID)
    }

    /// `client_secret`, when it is a string
    pub fn client_secret(&self) -> Option<&str> {
        self.get_str(CLIENT_SECRET)
    }

    /// `client_name`, when it is a string
    pub fn client_name(&self) -> Option<&str> {
        self.get_str(CLIENT_NAME)
    }

    /// `scope`, when it is a string
    pub fn scope(&self) -> Option<&str> {
        self.get_str(SCOPE)
    }

    /// String entries of `redirect_uris`
    pub fn redirect_uris(&self) -> Vec<&str> {
        self.string_list(REDIRECT_URIS)
    }

    /// String entries of `post_logout_redirect_uris`
    pub fn post_logout_redirect_uris(&self) -> Vec<&str> {
        self.string_list(POST_LOGOUT_REDIRECT_URIS)
    }

    /// Time at which the client identifier was issued
    pub fn client_id_issued_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CLIENT_ID_ISSUED_AT)
    }

    /// Time at which the client secret expires; `None` when absent or `0` (never expires)
    pub fn client_secret_expires_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CLIENT_SECRET_EXPIRES_AT)
            .filter(|expires_at| expires_at.timestamp() != 0)
    }

    fn string_list(&self, key: &str) -> Vec<&str> {
        match self.0.get(key) {
            Some(Value::Array(values)) => values.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(value)) => vec![value.as_str()],
            _ => Vec::new(),
        }
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.0
            .get(key)
            .and_then(Value::as_i64)
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
    }
}

impl From<Map<String, Value>> for ClientMetadata {
    fn from(json: Map<String, Value>) -> Self {
        Self(json)
    }
}

impl std::fmt::Display for ClientMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.metadata_string())
    }
}

impl<'a> IntoIterator for &'a ClientMetadata {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Builder for [`ClientMetadata`]; keys are emitted in the order they are first set
#[derive(Debug, Clone, Default)]
pub struct ClientMetadataBuilder {
    json: Map<String, Value>,
}

impl ClientMetadataBuilder {
    /// Set `client_id`
    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        self.property(CLIENT_ID, client_id.into())
    }

    /// Set `client_secret`
    pub fn client_secret(self, client_secret: impl Into<String>) -> Self {
        self.property(CLIENT_SECRET, client_secret.into())
    }

    /// Set `client_name`
    pub fn client_name(self, client_name: impl Into<String>) -> Self {
        self.property(CLIENT_NAME, client_name.into())
    }

    /// Append a redirect URI to `redirect_uris`
    pub fn redirect_uri(self, redirect_uri: impl Into<String>) -> Self {
        self.append(REDIRECT_URIS, redirect_uri.into())
    }

    /// Replace `redirect_uris`
    pub fn redirect_uris<I, S>(self, redirect_uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_list(REDIRECT_URIS, redirect_uris)
    }

    /// Append a redirect URI to `post_logout_redirect_uris`
    pub fn post_logout_redirect_uri(self, redirect_uri: impl Into<String>) -> Self {
        self.append(POST_LOGOUT_REDIRECT_URIS, redirect_uri.into())
    }

    /// Set `grant_types`
    pub fn grant_types<I, S>(self, grant_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_list(GRANT_TYPES, grant_types)
    }

    /// Set `response_types`
    pub fn response_types<I, S>(self, response_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_list(RESPONSE_TYPES, response_types)
    }

    /// Set the space separated `scope`
    pub fn scope(self, scope: impl Into<String>) -> Self {
        self.property(SCOPE, scope.into())
    }

    /// Set `token_endpoint_auth_method`
    pub fn token_endpoint_auth_method(self, method: impl Into<String>) -> Self {
        self.property(TOKEN_ENDPOINT_AUTH_METHOD, method.into())
    }

    /// Set an arbitrary metadata property
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.json.insert(key.into(), value.into());
        self
    }

    /// Copy every property of a JSON object, in its order
    pub fn extend(mut self, json: Map<String, Value>) -> Self {
        for (key, value) in json {
            self.json.insert(key, value);
        }
        self
    }

    /// Finish building
    pub fn build(self) -> ClientMetadata {
        ClientMetadata(self.json)
    }

    fn string_list<I, S>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<Value> = values.into_iter().map(|v| Value::String(v.into())).collect();
        self.property(key, Value::Array(values))
    }

    fn append(mut self, key: &str, value: String) -> Self {
        match self.json.get_mut(key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            _ => {
                self.json
                    .insert(key.to_string(), Value::Array(vec![Value::String(value)]));
            }
        }
        self
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
