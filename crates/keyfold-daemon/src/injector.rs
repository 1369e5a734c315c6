use crate::marker::{SyntheticMarker, Tag};
use enigo::{Direction, Enigo, Key, Keyboard, Settings as EnigoSettings};
use keyfold_core::{ClipboardAccess, ExpansionDecision, KeyfoldError, Result, Settings};
use rdev::Key as RdevKey;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest run of text handed to the synthesizer in one call.
const CHUNK_SIZE: usize = 512;

/// Pause between the last deletion and the insertion.
const DELETE_SETTLE: Duration = Duration::from_millis(10);

/// Pause between typed chunks.
const CHUNK_PAUSE: Duration = Duration::from_millis(5);

/// Keys the injector synthesizes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthKey {
    Backspace,
    LeftArrow,
    Return,
    /// The platform paste gesture (Cmd+V on macOS, Ctrl+V elsewhere).
    Paste,
}

impl SynthKey {
    /// Keys the OS will report back to the hook for this synthesized press.
    pub fn observed_keys(self) -> &'static [RdevKey] {
        match self {
            SynthKey::Backspace => &[RdevKey::Backspace],
            SynthKey::LeftArrow => &[RdevKey::LeftArrow],
            SynthKey::Return => &[RdevKey::Return],
            #[cfg(target_os = "macos")]
            SynthKey::Paste => &[RdevKey::MetaLeft, RdevKey::KeyV],
            #[cfg(not(target_os = "macos"))]
            SynthKey::Paste => &[RdevKey::ControlLeft, RdevKey::KeyV],
        }
    }
}

/// Platform keystroke synthesis.
pub trait KeySynthesizer {
    fn key(&mut self, key: SynthKey) -> Result<()>;
    fn text(&mut self, text: &str) -> Result<()>;
}

/// Synthesizer backed by enigo.
pub struct EnigoSynthesizer {
    enigo: Enigo,
}

impl EnigoSynthesizer {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&EnigoSettings::default()).map_err(|err| {
            KeyfoldError::Keyboard(format!("Failed to create keyboard controller: {}", err))
        })?;
        Ok(Self { enigo })
    }

    fn click(&mut self, key: Key) -> Result<()> {
        self.enigo
            .key(key, Direction::Click)
            .map_err(|err| KeyfoldError::Keyboard(format!("Failed to send {:?}: {}", key, err)))
    }
}

impl KeySynthesizer for EnigoSynthesizer {
    fn key(&mut self, key: SynthKey) -> Result<()> {
        match key {
            SynthKey::Backspace => self.click(Key::Backspace),
            SynthKey::LeftArrow => self.click(Key::LeftArrow),
            SynthKey::Return => self.click(Key::Return),
            SynthKey::Paste => {
                #[cfg(target_os = "macos")]
                let modifier = Key::Meta;
                #[cfg(not(target_os = "macos"))]
                let modifier = Key::Control;

                self.enigo
                    .key(modifier, Direction::Press)
                    .map_err(|err| KeyfoldError::Keyboard(format!("Failed to press modifier: {}", err)))?;
                let pasted = self.click(Key::Unicode('v'));
                // Always release the modifier, even if the V press failed.
                let released = self
                    .enigo
                    .key(modifier, Direction::Release)
                    .map_err(|err| KeyfoldError::Keyboard(format!("Failed to release modifier: {}", err)));
                pasted.and(released)
            }
        }
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.enigo
            .text(text)
            .map_err(|err| KeyfoldError::Keyboard(format!("Failed to type text: {}", err)))
    }
}

pub type SynthesizerFactory = Box<dyn Fn() -> Result<Box<dyn KeySynthesizer>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMethod {
    Paste,
    Typed,
    /// Empty replacement text, nothing to insert.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionReport {
    pub method: InsertMethod,
    /// Synthesize calls that failed; the rest of the sequence still ran.
    pub failures: usize,
}

/// Executes expansion decisions against the focused application.
///
/// Sequences are serialized: a second decision waits until the previous
/// one has finished its deletions, insertion and cursor moves.
pub struct Injector {
    factory: SynthesizerFactory,
    marker: Arc<SyntheticMarker>,
    clipboard: Arc<dyn ClipboardAccess>,
    key_delay: Duration,
    paste_settle: Duration,
    delete_settle: Duration,
    chunk_pause: Duration,
    sequence: Mutex<()>,
}

impl Injector {
    pub fn new(
        factory: SynthesizerFactory,
        marker: Arc<SyntheticMarker>,
        clipboard: Arc<dyn ClipboardAccess>,
        settings: &Settings,
    ) -> Self {
        Self {
            factory,
            marker,
            clipboard,
            key_delay: settings.key_delay(),
            paste_settle: settings.paste_settle(),
            delete_settle: DELETE_SETTLE,
            chunk_pause: CHUNK_PAUSE,
            sequence: Mutex::new(()),
        }
    }

    /// Injector driving the real keyboard through enigo.
    pub fn system(
        marker: Arc<SyntheticMarker>,
        clipboard: Arc<dyn ClipboardAccess>,
        settings: &Settings,
    ) -> Self {
        let factory: SynthesizerFactory =
            Box::new(|| Ok(Box::new(EnigoSynthesizer::new()?) as Box<dyn KeySynthesizer>));
        Self::new(factory, marker, clipboard, settings)
    }

    /// Delete the abbreviation, insert the replacement and place the caret.
    pub fn execute(&self, decision: &ExpansionDecision) -> Result<InjectionReport> {
        let _sequence = self
            .sequence
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut keyboard = (self.factory)()?;
        let mut failures = 0;

        info!(
            "Replacing: delete {}, insert {} chars, cursor back {}",
            decision.delete_count,
            decision.replacement_text.chars().count(),
            decision.cursor_back_offset
        );

        for _ in 0..decision.delete_count {
            failures += self.press(keyboard.as_mut(), SynthKey::Backspace);
        }

        if decision.delete_count > 0 {
            thread::sleep(self.delete_settle);
        }

        let method = if decision.replacement_text.is_empty() {
            InsertMethod::Skipped
        } else if self.paste(keyboard.as_mut(), &decision.replacement_text) {
            InsertMethod::Paste
        } else {
            failures += self.type_text_with_formatting(keyboard.as_mut(), &decision.replacement_text);
            InsertMethod::Typed
        };

        for _ in 0..decision.cursor_back_offset {
            failures += self.press(keyboard.as_mut(), SynthKey::LeftArrow);
        }

        if failures > 0 {
            warn!("Expansion finished with {} failed keystrokes", failures);
        }
        Ok(InjectionReport { method, failures })
    }

    /// Synthesize one key; returns the number of failures (0 or 1).
    fn press(&self, keyboard: &mut dyn KeySynthesizer, key: SynthKey) -> usize {
        let tags = key.observed_keys();
        for &observed in tags {
            self.marker.tag(Tag::Key(observed));
        }

        let result = keyboard.key(key);
        thread::sleep(self.key_delay);

        match result {
            Ok(()) => 0,
            Err(e) => {
                warn!("Failed to synthesize {:?}: {}", key, e);
                for &observed in tags {
                    self.marker.untag(Tag::Key(observed));
                }
                1
            }
        }
    }

    /// Stage the text on the clipboard and paste it, restoring the previous
    /// clipboard afterwards. Returns false when the clipboard path is unusable.
    fn paste(&self, keyboard: &mut dyn KeySynthesizer, text: &str) -> bool {
        let previous = match self.clipboard.paste() {
            Ok(previous) => Some(previous),
            Err(e) => {
                debug!("Could not read clipboard before paste: {}", e);
                None
            }
        };

        if let Err(e) = self.clipboard.copy(text) {
            warn!("Clipboard-based insertion failed, typing instead: {}", e);
            return false;
        }

        if self.press(keyboard, SynthKey::Paste) > 0 {
            warn!("Paste gesture failed, typing instead");
            self.restore_clipboard(previous);
            return false;
        }

        // Let the target application read the clipboard before it changes again.
        thread::sleep(self.paste_settle);
        self.restore_clipboard(previous);
        true
    }

    fn restore_clipboard(&self, previous: Option<String>) {
        if let Some(previous) = previous {
            if let Err(e) = self.clipboard.copy(&previous) {
                warn!("Failed to restore clipboard: {}", e);
            }
        }
    }

    /// Type text as discrete keystrokes, pressing Return between lines.
    /// Returns the number of failed synthesize calls.
    fn type_text_with_formatting(&self, keyboard: &mut dyn KeySynthesizer, text: &str) -> usize {
        let mut failures = 0;

        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                failures += self.press(keyboard, SynthKey::Return);
            }

            let chars: Vec<char> = line.chars().filter(|&c| c != '\r').collect();
            for chunk in chars.chunks(CHUNK_SIZE) {
                let chunk_str: String = chunk.iter().collect();
                for &c in chunk {
                    self.marker.tag(Tag::Char(c));
                }

                if let Err(e) = keyboard.text(&chunk_str) {
                    warn!("Failed to type text: {}", e);
                    for &c in chunk {
                        self.marker.untag(Tag::Char(c));
                    }
                    failures += 1;
                }

                thread::sleep(self.chunk_pause);
            }
        }

        failures
    }
}
