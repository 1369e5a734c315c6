//! Outbound path of the capture daemon: ships key events to the matching
//! service and hands its decisions to the injector.

use crate::injector::Injector;
use keyfold_core::protocol::{receive_message, send_message, Message};
use keyfold_core::{KeyEvent, KeyfoldError, Result, Settings};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Why a connected session ended.
enum SessionEnd {
    Shutdown,
    /// The hook side dropped its sender; nothing more will ever arrive.
    EventsClosed,
    Lost,
}

pub struct Forwarder {
    addr: SocketAddr,
    reconnect_delay: Duration,
    max_reconnect_attempts: Option<u32>,
    injector: Arc<Injector>,
}

impl Forwarder {
    pub fn new(addr: SocketAddr, settings: &Settings, injector: Arc<Injector>) -> Self {
        Self {
            addr,
            reconnect_delay: settings.reconnect_delay(),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            injector,
        }
    }

    /// Forwarder for a matching service on the loopback interface.
    pub fn loopback(port: u16, settings: &Settings, injector: Arc<Injector>) -> Self {
        Self::new(
            SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            settings,
            injector,
        )
    }

    /// Forward events until shutdown is signalled or the event source closes.
    ///
    /// While no connection is up, events are dropped: raw typing is never
    /// held back waiting for the service.
    pub async fn run(
        self,
        mut events: UnboundedReceiver<KeyEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut failed_attempts: u32 = 0;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            match TcpStream::connect(self.addr).await {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle: {}", e);
                    }
                    info!("Connected to matching service at {}", self.addr);
                    failed_attempts = 0;

                    match self.session(stream, &mut events, &mut shutdown).await {
                        SessionEnd::Shutdown | SessionEnd::EventsClosed => return Ok(()),
                        SessionEnd::Lost => {
                            warn!("Lost connection to matching service, expansions paused")
                        }
                    }
                }
                Err(e) => {
                    failed_attempts += 1;
                    warn!(
                        "Cannot reach matching service at {} (attempt {}): {}",
                        self.addr, failed_attempts, e
                    );
                    if let Some(max) = self.max_reconnect_attempts {
                        if failed_attempts >= max {
                            error!("Giving up after {} attempts", failed_attempts);
                            return Err(KeyfoldError::Other(format!(
                                "matching service at {} unreachable after {} attempts",
                                self.addr, failed_attempts
                            )));
                        }
                    }
                }
            }

            if !self.wait_before_retry(&mut events, &mut shutdown).await {
                return Ok(());
            }
        }
    }

    /// Sit out the reconnect delay, discarding keystrokes typed meanwhile.
    /// Returns false when the forwarder should stop instead of retrying.
    async fn wait_before_retry(
        &self,
        events: &mut UnboundedReceiver<KeyEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let deadline = Instant::now() + self.reconnect_delay;
        let mut dropped = 0usize;

        let keep_going = loop {
            tokio::select! {
                _ = sleep_until(deadline) => break true,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break false;
                    }
                }
                event = events.recv() => match event {
                    Some(_) => dropped += 1,
                    None => break false,
                },
            }
        };

        if dropped > 0 {
            debug!("Dropped {} key events while disconnected", dropped);
        }
        keep_going
    }

    async fn session(
        &self,
        stream: TcpStream,
        events: &mut UnboundedReceiver<KeyEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let (reader, mut writer) = stream.into_split();
        let mut replies = spawn_reply_reader(reader, Arc::clone(&self.injector));

        let end = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break SessionEnd::Shutdown;
                    }
                }
                _ = &mut replies => break SessionEnd::Lost,
                event = events.recv() => {
                    let Some(event) = event else {
                        break SessionEnd::EventsClosed;
                    };
                    // Best effort: a failed send is not retried.
                    if let Err(e) = send_message(&mut writer, &Message::KeyEvent(event)).await {
                        warn!("Failed to forward key event: {}", e);
                        break SessionEnd::Lost;
                    }
                }
            }
        };

        replies.abort();
        end
    }
}

/// Drain the service's replies and execute each decision in arrival order.
fn spawn_reply_reader(mut reader: OwnedReadHalf, injector: Arc<Injector>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receive_message(&mut reader).await {
                Ok(Some(Message::ReplaceText(decision))) => {
                    let injector = Arc::clone(&injector);
                    // Awaited before the next read, so sequences never interleave.
                    let outcome =
                        tokio::task::spawn_blocking(move || injector.execute(&decision)).await;
                    match outcome {
                        Ok(Ok(report)) => debug!("Injected via {:?}", report.method),
                        Ok(Err(e)) => error!("Injection failed: {}", e),
                        Err(e) => error!("Injection task panicked: {}", e),
                    }
                }
                Ok(Some(other)) => debug!("Ignoring unexpected {} from service", other.kind()),
                Ok(None) => {
                    debug!("Matching service closed the connection");
                    return;
                }
                Err(e) => {
                    warn!("Transport fault on service connection: {}", e);
                    return;
                }
            }
        }
    })
}
