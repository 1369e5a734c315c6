use crate::error::{KeyfoldError, Result};
use arboard::Clipboard;

/// Best-effort access to the system clipboard.
///
/// Callers treat every failure as recoverable: the resolver substitutes empty
/// text and the injector falls back to typing.
pub trait ClipboardAccess: Send + Sync {
    fn paste(&self) -> Result<String>;
    fn copy(&self, text: &str) -> Result<()>;
}

/// Clipboard backed by arboard. A fresh handle is opened per call since some
/// platforms invalidate long-lived handles when ownership changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn open() -> Result<Clipboard> {
        Clipboard::new().map_err(|e| KeyfoldError::Clipboard(e.to_string()))
    }
}

impl ClipboardAccess for SystemClipboard {
    fn paste(&self) -> Result<String> {
        Self::open()?
            .get_text()
            .map_err(|e| KeyfoldError::Clipboard(e.to_string()))
    }

    fn copy(&self, text: &str) -> Result<()> {
        Self::open()?
            .set_text(text)
            .map_err(|e| KeyfoldError::Clipboard(e.to_string()))
    }
}
