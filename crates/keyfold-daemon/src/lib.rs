//! keyfold capture daemon: observes keystrokes system-wide, forwards them to
//! the matching service and injects the replacements it decides on.

pub mod capture;
pub mod forwarder;
pub mod hook;
pub mod injector;
pub mod keyboard;
pub mod keyboard_listener;
pub mod marker;
pub mod permissions;

pub use capture::{CaptureDaemon, HookState};
pub use forwarder::Forwarder;
pub use hook::{HookCallback, HookEvent, KeyboardHook, RdevHook};
pub use injector::{
    EnigoSynthesizer, InjectionReport, Injector, InsertMethod, KeySynthesizer, SynthKey,
    SynthesizerFactory,
};
pub use keyboard_listener::KeyObserver;
pub use marker::{SyntheticMarker, Tag};
