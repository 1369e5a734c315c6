use std::io;
use thiserror::Error;

/// Faults raised while framing or decoding messages on a loopback connection.
///
/// Every variant means the connection is no longer usable; its owner closes it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("unencodable message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("undecodable message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum KeyfoldError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Keyboard error: {0}")]
    Keyboard(String),
    #[error("Clipboard error: {0}")]
    Clipboard(String),
    #[error("Invalid snippet: {0}")]
    InvalidSnippet(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Snippet '{0}' not found")]
    SnippetNotFound(String),
    #[error("Failed to install keyboard hook: {0}")]
    HookInstall(String),
    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KeyfoldError>;
