use crate::forwarder::Forwarder;
use crate::hook::{KeyboardHook, RdevHook};
use crate::injector::Injector;
use crate::keyboard_listener::KeyObserver;
use crate::marker::SyntheticMarker;
use crate::permissions::report_missing_permissions;
use keyfold_core::{KeyfoldError, Result, Settings, SystemClipboard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Uninstalled,
    Installed,
}

/// The capture/injection process: observes keystrokes through the hook,
/// forwards them to the matching service and injects the replies.
pub struct CaptureDaemon<H: KeyboardHook> {
    hook: H,
    state: HookState,
    port: u16,
    settings: Settings,
    marker: Arc<SyntheticMarker>,
    injector: Arc<Injector>,
}

impl CaptureDaemon<RdevHook> {
    /// Daemon using the real OS hook, enigo and the system clipboard.
    pub fn system(settings: Settings) -> Self {
        let marker = Arc::new(SyntheticMarker::new(settings.synthetic_ttl()));
        let injector = Injector::system(Arc::clone(&marker), Arc::new(SystemClipboard), &settings);
        Self::new(RdevHook::new(), settings, marker, Arc::new(injector))
    }
}

impl<H: KeyboardHook> CaptureDaemon<H> {
    /// The injector must tag into the same `marker` the daemon consumes from.
    pub fn new(
        hook: H,
        settings: Settings,
        marker: Arc<SyntheticMarker>,
        injector: Arc<Injector>,
    ) -> Self {
        Self {
            hook,
            state: HookState::Uninstalled,
            port: settings.port,
            settings,
            marker,
            injector,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    /// Run until `stop` is raised, the hook dies or forwarding gives up.
    pub fn run(&mut self, stop: Arc<AtomicBool>) -> Result<()> {
        let runtime = build_runtime()?;
        self.run_on(&runtime, stop)
    }

    /// Run until Ctrl+C.
    pub fn run_until_interrupted(&mut self) -> Result<()> {
        let runtime = build_runtime()?;
        let stop = Arc::new(AtomicBool::new(false));

        let signal_stop = Arc::clone(&stop);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down capture");
                signal_stop.store(true, Ordering::SeqCst);
            }
        });

        self.run_on(&runtime, stop)
    }

    fn run_on(&mut self, runtime: &Runtime, stop: Arc<AtomicBool>) -> Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let observer = KeyObserver::new(Arc::clone(&self.marker), events_tx);

        if let Err(e) = self.hook.install(observer.into_callback()) {
            report_missing_permissions(&e.to_string());
            return Err(match e {
                KeyfoldError::HookInstall(_) => e,
                other => KeyfoldError::HookInstall(other.to_string()),
            });
        }
        self.state = HookState::Installed;
        info!("Capturing keystrokes for the matching service on port {}", self.port);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let forwarder = Forwarder::loopback(self.port, &self.settings, Arc::clone(&self.injector));
        let forwarder_stop = Arc::clone(&stop);
        let forwarding = runtime.spawn(async move {
            let result = forwarder.run(events_rx, shutdown_rx).await;
            if result.is_err() {
                forwarder_stop.store(true, Ordering::SeqCst);
            }
            result
        });

        // Blocks this thread; the hook delivers events on its own thread.
        let pumped = self.hook.pump(&stop);
        if let Err(e) = &pumped {
            error!("Keyboard hook stopped: {}", e);
        }

        self.hook.uninstall();
        self.state = HookState::Uninstalled;
        let _ = shutdown_tx.send(true);

        let forwarded = runtime
            .block_on(forwarding)
            .map_err(|e| KeyfoldError::Other(format!("forwarder task failed: {}", e)))?;

        info!("Capture stopped");
        pumped.and(forwarded)
    }
}

fn build_runtime() -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("keyfold-capture")
        .enable_all()
        .build()?;
    Ok(runtime)
}
