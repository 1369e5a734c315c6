use keyfold_core::protocol::{receive_message, send_message, Message};
use keyfold_core::{
    ExpansionEngine, KeyEvent, PlaceholderResolver, Result, Settings, SnippetSource,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::utils::{accept_backoff, service_addr};

/// Hosts one expansion engine for every connected capture client.
///
/// Clients share a single session buffer. The intended deployment is one
/// capture client per service; further clients interleave their keystrokes
/// against the same buffer.
pub struct MatchingService {
    engine: Mutex<ExpansionEngine>,
    source: Arc<dyn SnippetSource>,
}

impl MatchingService {
    pub fn new(engine: ExpansionEngine, source: Arc<dyn SnippetSource>) -> Self {
        Self {
            engine: Mutex::new(engine),
            source,
        }
    }

    /// Build a service from a fresh dictionary snapshot.
    pub fn from_settings(
        settings: &Settings,
        source: Arc<dyn SnippetSource>,
        resolver: PlaceholderResolver,
    ) -> Result<Self> {
        let snippets = source.load()?;
        let mut engine = ExpansionEngine::new(snippets, settings.buffer_capacity, resolver);
        engine.set_enabled(settings.engine_enabled);
        if !engine.is_enabled() {
            warn!("Expansion engine is disabled in settings; key events will be ignored");
        }
        Ok(Self::new(engine, source))
    }

    fn engine(&self) -> MutexGuard<'_, ExpansionEngine> {
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Re-read the dictionary. On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<usize> {
        let snippets = self.source.load()?;
        let count = snippets.len();
        self.engine().reload(snippets);
        Ok(count)
    }

    pub fn snippet_count(&self) -> usize {
        self.engine().snippet_count()
    }

    /// Produce the reply, if any, for one inbound message.
    pub fn handle_message(&self, message: Message) -> Option<Message> {
        match message {
            Message::KeyEvent(KeyEvent {
                character,
                is_backspace,
            }) => self
                .engine()
                .process_key(character, is_backspace)
                .map(Message::ReplaceText),
            Message::Ping => Some(Message::Pong),
            Message::Reload => {
                let snippet_count = match self.reload() {
                    Ok(count) => count,
                    Err(e) => {
                        error!("Failed to reload snippets, keeping previous snapshot: {}", e);
                        self.snippet_count()
                    }
                };
                Some(Message::Reloaded { snippet_count })
            }
            other => {
                warn!("Ignoring unexpected {} message", other.kind());
                None
            }
        }
    }

    /// Bind the loopback listener.
    pub async fn bind(port: u16) -> Result<TcpListener> {
        let listener = TcpListener::bind(service_addr(port)).await?;
        info!("Matching service listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept clients until `shutdown` resolves, then close every connection.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut workers = JoinSet::new();
        let mut accept_failures = 0u32;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Matching service shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_failures = 0;
                        let service = Arc::clone(&self);
                        workers.spawn(service.handle_connection(stream, peer));
                    }
                    Err(e) => {
                        accept_failures = accept_failures.saturating_add(1);
                        let pause = accept_backoff(accept_failures);
                        error!("Error accepting connection: {} (retrying in {:?})", e, pause);
                        // Errors such as EMFILE repeat immediately; don't spin on them.
                        tokio::time::sleep(pause).await;
                    }
                },
                // Reap finished workers so the set does not grow unbounded.
                Some(_) = workers.join_next(), if !workers.is_empty() => {}
            }
        }

        workers.shutdown().await;
        Ok(())
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        info!("Capture client connected: {}", peer);
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", peer, e);
        }
        let (mut reader, mut writer) = stream.into_split();

        loop {
            let message = match receive_message(&mut reader).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("Capture client disconnected: {}", peer);
                    break;
                }
                Err(e) => {
                    warn!("Closing connection to {}: {}", peer, e);
                    break;
                }
            };

            // Placeholder resolution may block on the system clipboard.
            let service = Arc::clone(&self);
            let handled = tokio::task::spawn_blocking(move || service.handle_message(message)).await;
            let reply = match handled {
                Ok(Some(reply)) => reply,
                Ok(None) => continue,
                Err(e) => {
                    error!("Message handler for {} failed: {}", peer, e);
                    break;
                }
            };

            if let Err(e) = send_message(&mut writer, &reply).await {
                warn!("Failed to send {} to {}: {}", reply.kind(), peer, e);
                break;
            }
        }
    }
}
