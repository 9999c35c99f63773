//! Outgoing metadata for client configuration updates (RFC 7592 section 2.2).

use serde_json::{Map, Value};

use super::metadata::{
    CLIENT_ID, CLIENT_ID_ISSUED_AT, CLIENT_SECRET, CLIENT_SECRET_EXPIRES_AT, ClientMetadata,
};
use crate::errors::{RegistrationError, Result};

/// Server-assigned fields that must never be sent in an update request.
pub const PRIVATE_PROPERTIES: [&str; 2] = [CLIENT_SECRET_EXPIRES_AT, CLIENT_ID_ISSUED_AT];

/// Returns true for server-assigned fields listed in [`PRIVATE_PROPERTIES`]
pub fn is_private_property(key: &str) -> bool {
    PRIVATE_PROPERTIES.contains(&key)
}

/// Reject updates that would change the client identifier or secret.
///
/// Any value other than the current one counts as a change, including `null` and
/// non-string values.
pub fn check_immutable_fields(current: &ClientMetadata, update: &ClientMetadata) -> Result<()> {
    for (key, field) in [(CLIENT_ID, "Client id"), (CLIENT_SECRET, "Client secret")] {
        if let Some(value) = update.get(key) {
            if current.get(key) != Some(value) {
                return Err(RegistrationError::ImmutableFieldViolation(field));
            }
        }
    }
    Ok(())
}

/// Merge `update` into `current`.
///
/// Current keys come first in their existing order, taking the updated value when
/// `update` defines one. Keys only present in `update` follow in `update`'s order.
/// Private properties are dropped from both sides.
pub fn merge_metadata(current: &ClientMetadata, update: &ClientMetadata) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, value) in current {
        if is_private_property(key) {
            continue;
        }
        let value = update.get(key).unwrap_or(value);
        merged.insert(key.clone(), value.clone());
    }

    for (key, value) in update {
        if is_private_property(key) || current.contains_key(key) {
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }

    merged
}
