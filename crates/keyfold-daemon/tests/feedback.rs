//! Capture daemon against in-process fakes: a hook that the fake
//! synthesizer echoes its keystrokes into, and a matching service that
//! records every key event it receives.

use keyfold_core::protocol::{receive_message, send_message, Message};
use keyfold_core::{
    ClipboardAccess, ExpansionEngine, KeyEvent, KeyfoldError, PlaceholderResolver, Result,
    Settings, Snippet, Trigger,
};
use keyfold_daemon::{
    CaptureDaemon, HookCallback, HookEvent, HookState, Injector, KeySynthesizer, KeyboardHook,
    SynthKey, SynthesizerFactory, SyntheticMarker,
};
use rdev::Key as RdevKey;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

/// Shared slot through which both the fake hook and the fake synthesizer
/// reach the daemon's callback.
#[derive(Clone, Default)]
struct Loopback {
    callback: Arc<Mutex<Option<HookCallback>>>,
}

impl Loopback {
    fn emit(&self, event: HookEvent) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    fn tap(&self, key: RdevKey, name: Option<&str>) {
        self.emit(HookEvent::press(key, name));
        self.emit(HookEvent::release(key));
    }

    fn type_text(&self, text: &str) {
        for c in text.chars() {
            let key = match c {
                ' ' => RdevKey::Space,
                _ => RdevKey::Unknown(c as u32),
            };
            self.tap(key, Some(&c.to_string()));
        }
    }
}

struct FakeHook {
    loopback: Loopback,
    refuse: bool,
    installs: Arc<AtomicUsize>,
    uninstalls: Arc<AtomicUsize>,
}

impl FakeHook {
    fn new(loopback: Loopback) -> Self {
        Self {
            loopback,
            refuse: false,
            installs: Arc::default(),
            uninstalls: Arc::default(),
        }
    }
}

impl KeyboardHook for FakeHook {
    fn install(&mut self, callback: HookCallback) -> Result<()> {
        if self.refuse {
            return Err(KeyfoldError::HookInstall("access denied".to_string()));
        }
        self.installs.fetch_add(1, Ordering::SeqCst);
        *self.loopback.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn pump(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    fn uninstall(&mut self) {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        self.loopback.callback.lock().unwrap().take();
    }
}

/// Synthesizer whose output shows up at the hook like real OS input.
#[derive(Clone)]
struct EchoSynthesizer {
    loopback: Loopback,
    echo_delay: Option<Duration>,
    pastes: Arc<AtomicUsize>,
    typed: Arc<Mutex<String>>,
}

impl EchoSynthesizer {
    fn echo(&self, events: Vec<(RdevKey, Option<String>)>) {
        let loopback = self.loopback.clone();
        let replay = move || {
            for (key, name) in events {
                loopback.tap(key, name.as_deref());
            }
        };
        match self.echo_delay {
            Some(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    replay();
                });
            }
            None => replay(),
        }
    }
}

impl KeySynthesizer for EchoSynthesizer {
    fn key(&mut self, key: SynthKey) -> Result<()> {
        if key == SynthKey::Paste {
            self.pastes.fetch_add(1, Ordering::SeqCst);
        }
        let events = key.observed_keys().iter().map(|&k| (k, None)).collect();
        self.echo(events);
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.typed.lock().unwrap().push_str(text);
        let events = text
            .chars()
            .map(|c| (RdevKey::Unknown(c as u32), Some(c.to_string())))
            .collect();
        self.echo(events);
        Ok(())
    }
}

#[derive(Default)]
struct MemoryClipboard {
    contents: Mutex<String>,
    broken: bool,
}

impl ClipboardAccess for MemoryClipboard {
    fn paste(&self) -> Result<String> {
        if self.broken {
            return Err(KeyfoldError::Clipboard("unavailable".to_string()));
        }
        Ok(self.contents.lock().unwrap().clone())
    }

    fn copy(&self, text: &str) -> Result<()> {
        if self.broken {
            return Err(KeyfoldError::Clipboard("unavailable".to_string()));
        }
        *self.contents.lock().unwrap() = text.to_string();
        Ok(())
    }
}

/// Matching service stand-in that records every key event it is sent.
async fn recording_service(
    listener: TcpListener,
    connected: Arc<AtomicBool>,
    recorded: Arc<Mutex<Vec<KeyEvent>>>,
) {
    let Ok((mut stream, _)) = listener.accept().await else {
        return;
    };
    connected.store(true, Ordering::SeqCst);
    let mut engine = ExpansionEngine::new(
        vec![Snippet::new("btw", "by the way", Trigger::Space)],
        100,
        PlaceholderResolver::system(),
    );

    while let Ok(Some(message)) = receive_message(&mut stream).await {
        if let Message::KeyEvent(event) = message {
            recorded.lock().unwrap().push(event);
            if let Some(decision) = engine.process_key(event.character, event.is_backspace) {
                if send_message(&mut stream, &Message::ReplaceText(decision))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
    }
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

struct Scenario {
    ttl: Duration,
    echo_delay: Option<Duration>,
    clipboard_broken: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(500),
            echo_delay: None,
            clipboard_broken: false,
        }
    }
}

struct Outcome {
    recorded: Vec<KeyEvent>,
    pastes: usize,
    typed: String,
}

impl Scenario {
    /// Type "btw " through the fake hook and let the expansion play out.
    fn run(self, settle_until: impl Fn(&[KeyEvent]) -> bool) -> Outcome {
        let runtime = Runtime::new().unwrap();
        let listener = runtime
            .block_on(TcpListener::bind(("127.0.0.1", 0)))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let connected = Arc::new(AtomicBool::new(false));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        runtime.spawn(recording_service(
            listener,
            Arc::clone(&connected),
            Arc::clone(&recorded),
        ));

        let settings = Settings {
            key_delay_ms: 0,
            paste_settle_ms: 0,
            reconnect_delay_ms: 20,
            ..Settings::default()
        };
        let loopback = Loopback::default();
        let synth = EchoSynthesizer {
            loopback: loopback.clone(),
            echo_delay: self.echo_delay,
            pastes: Arc::default(),
            typed: Arc::default(),
        };
        let factory_synth = synth.clone();
        let factory: SynthesizerFactory =
            Box::new(move || Ok(Box::new(factory_synth.clone()) as Box<dyn KeySynthesizer>));

        let marker = Arc::new(SyntheticMarker::new(self.ttl));
        let clipboard = Arc::new(MemoryClipboard {
            broken: self.clipboard_broken,
            ..MemoryClipboard::default()
        });
        let injector = Arc::new(Injector::new(
            factory,
            Arc::clone(&marker),
            clipboard,
            &settings,
        ));

        let mut daemon = CaptureDaemon::new(FakeHook::new(loopback.clone()), settings, marker, injector)
            .with_port(port);
        let stop = Arc::new(AtomicBool::new(false));
        let daemon_stop = Arc::clone(&stop);
        let capture = thread::spawn(move || {
            let result = daemon.run(daemon_stop);
            (result, daemon.state())
        });

        wait_for("hook install", || loopback.callback.lock().unwrap().is_some());
        wait_for("forwarder connection", || connected.load(Ordering::SeqCst));

        loopback.type_text("btw ");
        wait_for("expansion", || {
            settle_until(recorded.lock().unwrap().as_slice())
                && (synth.pastes.load(Ordering::SeqCst) > 0
                    || !synth.typed.lock().unwrap().is_empty())
        });
        // Leave room for any stray echoes to reach the service.
        thread::sleep(Duration::from_millis(200));

        stop.store(true, Ordering::SeqCst);
        let (result, state) = capture.join().unwrap();
        result.unwrap();
        assert_eq!(state, HookState::Uninstalled);

        let recorded = recorded.lock().unwrap().clone();
        let typed = synth.typed.lock().unwrap().clone();
        Outcome {
            recorded,
            pastes: synth.pastes.load(Ordering::SeqCst),
            typed,
        }
    }
}

fn typed_btw() -> Vec<KeyEvent> {
    "btw ".chars().map(KeyEvent::character).collect()
}

#[test]
fn synthesized_keys_never_reach_the_service() {
    let outcome = Scenario::default().run(|events| events.len() >= 4);

    assert_eq!(outcome.pastes, 1);
    assert_eq!(outcome.recorded, typed_btw());
}

#[test]
fn delayed_echoes_are_still_suppressed() {
    let outcome = Scenario {
        echo_delay: Some(Duration::from_millis(30)),
        ..Scenario::default()
    }
    .run(|events| events.len() >= 4);

    assert_eq!(outcome.recorded, typed_btw());
}

#[test]
fn typed_fallback_is_suppressed_too() {
    let outcome = Scenario {
        clipboard_broken: true,
        ..Scenario::default()
    }
    .run(|events| events.len() >= 4);

    assert_eq!(outcome.pastes, 0);
    assert_eq!(outcome.typed, "by the way");
    assert_eq!(outcome.recorded, typed_btw());
}

#[test]
fn without_marking_the_injection_feeds_back() {
    let outcome = Scenario {
        ttl: Duration::ZERO,
        ..Scenario::default()
    }
    .run(|events| events.len() >= 8);

    let backspaces = outcome
        .recorded
        .iter()
        .filter(|e| **e == KeyEvent::backspace())
        .count();
    assert_eq!(backspaces, 4);
    assert_eq!(&outcome.recorded[..4], typed_btw().as_slice());
}

#[test]
fn install_failure_is_fatal_and_leaves_hook_uninstalled() {
    let loopback = Loopback::default();
    let mut hook = FakeHook::new(loopback);
    hook.refuse = true;
    let installs = Arc::clone(&hook.installs);

    let settings = Settings::default();
    let marker = Arc::new(SyntheticMarker::default());
    let factory: SynthesizerFactory =
        Box::new(|| Err(KeyfoldError::Keyboard("unused".to_string())));
    let injector = Arc::new(Injector::new(
        factory,
        Arc::clone(&marker),
        Arc::new(MemoryClipboard::default()),
        &settings,
    ));
    let mut daemon = CaptureDaemon::new(hook, settings, marker, injector);

    let err = daemon.run(Arc::new(AtomicBool::new(false))).unwrap_err();
    assert!(matches!(err, KeyfoldError::HookInstall(_)));
    assert_eq!(daemon.state(), HookState::Uninstalled);
    assert_eq!(installs.load(Ordering::SeqCst), 0);
}

#[test]
fn hook_is_uninstalled_on_shutdown() {
    let loopback = Loopback::default();
    let hook = FakeHook::new(loopback.clone());
    let installs = Arc::clone(&hook.installs);
    let uninstalls = Arc::clone(&hook.uninstalls);

    // No service listening: forwarding keeps retrying until shutdown.
    let settings = Settings {
        reconnect_delay_ms: 10,
        ..Settings::default()
    };
    let marker = Arc::new(SyntheticMarker::default());
    let factory: SynthesizerFactory =
        Box::new(|| Err(KeyfoldError::Keyboard("unused".to_string())));
    let injector = Arc::new(Injector::new(
        factory,
        Arc::clone(&marker),
        Arc::new(MemoryClipboard::default()),
        &settings,
    ));
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut daemon = CaptureDaemon::new(hook, settings, marker, injector).with_port(port);

    let stop = Arc::new(AtomicBool::new(false));
    let daemon_stop = Arc::clone(&stop);
    let capture = thread::spawn(move || daemon.run(daemon_stop));

    wait_for("hook install", || loopback.callback.lock().unwrap().is_some());
    // Typing while disconnected must not block the hook.
    loopback.type_text("hello");
    stop.store(true, Ordering::SeqCst);

    capture.join().unwrap().unwrap();
    assert_eq!(installs.load(Ordering::SeqCst), 1);
    assert_eq!(uninstalls.load(Ordering::SeqCst), 1);
    assert!(loopback.callback.lock().unwrap().is_none());
}

#[test]
fn gives_up_after_bounded_reconnect_attempts() {
    let loopback = Loopback::default();
    let settings = Settings {
        reconnect_delay_ms: 5,
        max_reconnect_attempts: Some(2),
        ..Settings::default()
    };
    let marker = Arc::new(SyntheticMarker::default());
    let factory: SynthesizerFactory =
        Box::new(|| Err(KeyfoldError::Keyboard("unused".to_string())));
    let injector = Arc::new(Injector::new(
        factory,
        Arc::clone(&marker),
        Arc::new(MemoryClipboard::default()),
        &settings,
    ));
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let mut daemon =
        CaptureDaemon::new(FakeHook::new(loopback), settings, marker, injector).with_port(port);

    // The forwarder raises the stop flag itself once it gives up.
    let err = daemon.run(Arc::new(AtomicBool::new(false))).unwrap_err();
    assert!(matches!(err, KeyfoldError::Other(_)));
    assert_eq!(daemon.state(), HookState::Uninstalled);
}
