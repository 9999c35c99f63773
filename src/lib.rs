//! AIP registered client management library crate.
//!
//! Provides client-side management of a dynamically registered OAuth 2.0 / OpenID Connect
//! client per RFC 7592: reading, updating and deleting the registration through the
//! client configuration endpoint granted at registration time.

pub mod config;
pub mod errors;
pub mod http;
pub mod registration;
