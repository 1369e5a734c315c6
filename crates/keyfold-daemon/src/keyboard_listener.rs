use crate::hook::{HookCallback, HookEvent};
use crate::keyboard::{classify_key, KeyInput};
use crate::marker::SyntheticMarker;
use keyfold_core::KeyEvent;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Turns raw hook events into key events for the forwarder.
///
/// Runs on the hook thread: it never blocks and never touches the network,
/// it only classifies the key and enqueues it.
pub struct KeyObserver {
    marker: Arc<SyntheticMarker>,
    events: UnboundedSender<KeyEvent>,
}

impl KeyObserver {
    pub fn new(marker: Arc<SyntheticMarker>, events: UnboundedSender<KeyEvent>) -> Self {
        Self { marker, events }
    }

    pub fn observe(&self, event: HookEvent) {
        if !event.pressed {
            return;
        }

        let input = classify_key(event.key, event.name.as_deref());
        if self.marker.take(event.key, input.as_char()) {
            trace!("Skipping synthesized {:?}", event.key);
            return;
        }

        let key_event = match input {
            KeyInput::Char(c) => KeyEvent::character(c),
            KeyInput::Backspace => KeyEvent::backspace(),
            KeyInput::Ignored => return,
        };

        // A closed channel means the daemon is shutting down; typing goes on regardless.
        if self.events.send(key_event).is_err() {
            trace!("Forwarder gone, dropping {:?}", key_event);
        }
    }

    pub fn into_callback(self) -> HookCallback {
        Arc::new(move |event| self.observe(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::Tag;
    use rdev::Key as RdevKey;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn forwards_genuine_key_downs_only() {
        let (tx, mut rx) = unbounded_channel();
        let observer = KeyObserver::new(Arc::new(SyntheticMarker::default()), tx);

        observer.observe(HookEvent::press(RdevKey::KeyA, Some("a")));
        observer.observe(HookEvent::release(RdevKey::KeyA));
        observer.observe(HookEvent::press(RdevKey::ShiftLeft, None));
        observer.observe(HookEvent::press(RdevKey::Backspace, None));

        assert_eq!(rx.try_recv().unwrap(), KeyEvent::character('a'));
        assert_eq!(rx.try_recv().unwrap(), KeyEvent::backspace());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn skips_tagged_keys() {
        let (tx, mut rx) = unbounded_channel();
        let marker = Arc::new(SyntheticMarker::default());
        let observer = KeyObserver::new(Arc::clone(&marker), tx);

        marker.tag(Tag::Key(RdevKey::Backspace));
        marker.tag(Tag::Char('x'));
        observer.observe(HookEvent::press(RdevKey::Backspace, None));
        observer.observe(HookEvent::press(RdevKey::KeyX, Some("x")));
        observer.observe(HookEvent::press(RdevKey::KeyX, Some("x")));

        assert_eq!(rx.try_recv().unwrap(), KeyEvent::character('x'));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn survives_a_closed_channel() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let callback = KeyObserver::new(Arc::new(SyntheticMarker::default()), tx).into_callback();
        callback(HookEvent::press(RdevKey::KeyQ, Some("q")));
    }
}
