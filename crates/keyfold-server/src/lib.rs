//! Matching service: serves the expansion engine to capture clients over the
//! loopback wire protocol.

pub mod server;

pub use server::client::{ping_service, reload_service, ServiceClient};
pub use server::service::MatchingService;
