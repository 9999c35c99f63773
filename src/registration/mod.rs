//! Registered client management per RFC 7592.
//!
//! Reads, updates and deletes a dynamically registered client through its client
//! configuration endpoint.

pub mod client;
pub mod merge;
pub mod metadata;

pub use client::RegisteredClient;
pub use merge::{PRIVATE_PROPERTIES, check_immutable_fields, merge_metadata};
pub use metadata::{ClientMetadata, ClientMetadataBuilder};
