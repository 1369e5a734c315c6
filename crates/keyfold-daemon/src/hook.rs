//! Process-wide keystroke observation.

use keyfold_core::{KeyfoldError, Result};
use rdev::{EventType, Key as RdevKey};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// How long a freshly started listener gets to fail before it counts as installed.
const INSTALL_GRACE: Duration = Duration::from_millis(250);
const PUMP_POLL: Duration = Duration::from_millis(100);

/// A key transition as reported by the OS hook.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub key: RdevKey,
    /// Character the OS says the key produced, if any.
    pub name: Option<String>,
    pub pressed: bool,
}

impl HookEvent {
    pub fn press(key: RdevKey, name: Option<&str>) -> Self {
        Self {
            key,
            name: name.map(str::to_string),
            pressed: true,
        }
    }

    pub fn release(key: RdevKey) -> Self {
        Self {
            key,
            name: None,
            pressed: false,
        }
    }
}

/// Invoked on the hook thread for every observed key transition. Must not block.
pub type HookCallback = Arc<dyn Fn(HookEvent) + Send + Sync>;

/// OS keystroke hook. Observation is always pass-through: callbacks cannot
/// suppress or alter the original keystroke.
pub trait KeyboardHook: Send {
    /// Start observing. Failure is fatal to the capture daemon.
    fn install(&mut self, callback: HookCallback) -> Result<()>;

    /// Dispatch events until `stop` is raised or the hook dies.
    fn pump(&mut self, stop: &AtomicBool) -> Result<()>;

    /// Stop delivering events to the callback.
    fn uninstall(&mut self);
}

/// Global hook backed by `rdev::listen`.
///
/// rdev offers no way to unhook a running listener, so `uninstall` detaches
/// the callback and the listener thread ends with the process.
pub struct RdevHook {
    active: Arc<AtomicBool>,
    exited: Option<mpsc::Receiver<String>>,
}

impl RdevHook {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            exited: None,
        }
    }
}

impl Default for RdevHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardHook for RdevHook {
    fn install(&mut self, callback: HookCallback) -> Result<()> {
        if self.active.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (exit_tx, exit_rx) = mpsc::channel();
        let active = Arc::clone(&self.active);
        active.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("keyfold-hook".to_string())
            .spawn(move || {
                let listener_active = Arc::clone(&active);
                let result = rdev::listen(move |event| {
                    if !listener_active.load(Ordering::Relaxed) {
                        return;
                    }
                    let hook_event = match event.event_type {
                        EventType::KeyPress(key) => HookEvent {
                            key,
                            name: event.name,
                            pressed: true,
                        },
                        EventType::KeyRelease(key) => HookEvent::release(key),
                        _ => return,
                    };
                    callback(hook_event);
                });

                // listen only returns on failure
                let reason = match result {
                    Ok(()) => "listener stopped".to_string(),
                    Err(e) => format!("{:?}", e),
                };
                active.store(false, Ordering::SeqCst);
                let _ = exit_tx.send(reason);
            })?;

        match exit_rx.recv_timeout(INSTALL_GRACE) {
            Ok(reason) => {
                self.active.store(false, Ordering::SeqCst);
                Err(KeyfoldError::HookInstall(reason))
            }
            Err(_) => {
                info!("Keyboard hook installed");
                self.exited = Some(exit_rx);
                Ok(())
            }
        }
    }

    fn pump(&mut self, stop: &AtomicBool) -> Result<()> {
        let Some(exited) = self.exited.as_ref() else {
            return Err(KeyfoldError::HookInstall("hook is not installed".to_string()));
        };

        while !stop.load(Ordering::SeqCst) {
            match exited.recv_timeout(PUMP_POLL) {
                Ok(reason) => {
                    error!("Keyboard listener exited: {}", reason);
                    return Err(KeyfoldError::HookInstall(reason));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(KeyfoldError::HookInstall("listener thread vanished".to_string()));
                }
            }
        }

        debug!("Hook pump stopped");
        Ok(())
    }

    fn uninstall(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            info!("Keyboard hook uninstalled");
        }
        self.exited = None;
    }
}
