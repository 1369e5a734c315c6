//! Utilities for locating the matching service.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Loopback address of the matching service on `port`.
pub fn service_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

/// Check if a port is available by trying to bind to it
pub fn port_is_available(port: u16) -> bool {
    std::net::TcpListener::bind(service_addr(port)).is_ok()
}

/// Pause before retrying `accept` after `failures` consecutive errors.
pub fn accept_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_BASE
        .saturating_mul(factor)
        .min(ACCEPT_BACKOFF_MAX)
}
