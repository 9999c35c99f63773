//! HTTP plumbing for the client configuration endpoint: transport, request filters and
//! the retrying request pipeline.

pub mod context;
pub mod filters;
pub(crate) mod pipeline;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_transport;

pub use context::{ManagementContext, RetryPolicy};
pub use filters::{EndpointType, RequestContextProperties, RequestFilter, RequestFilters};
pub use transport::{OutgoingRequest, ReqwestTransport, Transport, TransportResponse};
