//! keyfold core: snippet dictionary, matching engine and the framed wire
//! protocol shared by the matching service and the capture daemon.

pub mod buffer;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod expansion;
pub mod models;
pub mod placeholders;
pub mod protocol;
pub mod storage;

// Re-export common items for convenience
pub use buffer::SessionBuffer;
pub use clipboard::{ClipboardAccess, SystemClipboard};
pub use config::{get_config_dir, Settings, DEFAULT_PORT};
pub use error::{KeyfoldError, Result, TransportError};
pub use expansion::ExpansionEngine;
pub use models::{ExpansionDecision, KeyEvent, Snippet, Trigger};
pub use placeholders::{Clock, PlaceholderResolver, SystemClock, CURSOR_MARKER};
pub use protocol::{receive_message, send_message, Message, MAX_FRAME_LEN};
pub use storage::{
    add_snippet, delete_snippet, find_snippet, set_active, update_snippet, JsonStore, SnippetSource,
};
