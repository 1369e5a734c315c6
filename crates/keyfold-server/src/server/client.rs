//! Request/response helpers for talking to a running matching service.

use keyfold_core::protocol::{receive_message, send_message, Message};
use keyfold_core::{KeyfoldError, Result};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::utils::service_addr;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// One connection to the matching service used for control requests.
pub struct ServiceClient {
    stream: TcpStream,
}

impl ServiceClient {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect(service_addr(port)).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to matching service on port {}", port);
        Ok(Self { stream })
    }

    /// Send a request and wait for the single reply it produces.
    pub async fn request(&mut self, message: &Message) -> Result<Message> {
        send_message(&mut self.stream, message).await?;

        match timeout(REQUEST_TIMEOUT, receive_message(&mut self.stream)).await {
            Ok(Ok(Some(reply))) => Ok(reply),
            Ok(Ok(None)) => Err(KeyfoldError::Other(
                "matching service closed the connection".to_string(),
            )),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(KeyfoldError::Other(format!(
                "no reply to {} within {:?}",
                message.kind(),
                REQUEST_TIMEOUT
            ))),
        }
    }
}

/// Round-trip a ping and report the latency.
pub async fn ping_service(port: u16) -> Result<Duration> {
    let mut client = ServiceClient::connect(port).await?;
    let started = Instant::now();
    match client.request(&Message::Ping).await? {
        Message::Pong => Ok(started.elapsed()),
        other => Err(KeyfoldError::Other(format!(
            "expected pong, got {}",
            other.kind()
        ))),
    }
}

/// Ask the service to reload its dictionary; returns the new snippet count.
pub async fn reload_service(port: u16) -> Result<usize> {
    let mut client = ServiceClient::connect(port).await?;
    match client.request(&Message::Reload).await? {
        Message::Reloaded { snippet_count } => Ok(snippet_count),
        other => Err(KeyfoldError::Other(format!(
            "expected reloaded, got {}",
            other.kind()
        ))),
    }
}
