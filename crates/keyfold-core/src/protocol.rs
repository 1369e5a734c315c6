//! Framed messages exchanged between the capture daemon and the matching service.
//!
//! Frame layout: `[u32 big-endian payload length][JSON payload]`. The payload
//! is an object with a `type` discriminator and, for message types that carry
//! data, a `payload` object of named fields.

use crate::error::TransportError;
use crate::models::{ExpansionDecision, KeyEvent};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

/// Upper bound on a single frame's payload.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    KeyEvent(KeyEvent),
    ReplaceText(ExpansionDecision),
    Ping,
    Pong,
    /// Ask the service to re-read its snippet dictionary.
    Reload,
    Reloaded { snippet_count: usize },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::KeyEvent(_) => "key_event",
            Message::ReplaceText(_) => "replace_text",
            Message::Ping => "ping",
            Message::Pong => "pong",
            Message::Reload => "reload",
            Message::Reloaded { .. } => "reloaded",
        }
    }
}

/// Encode a message into a complete frame.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, TransportError> {
    frame_body(message)
}

fn frame_body<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(value).map_err(TransportError::Encode)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_payload(body: &[u8]) -> Result<Message, TransportError> {
    serde_json::from_slice(body).map_err(TransportError::Decode)
}

/// Write one message as a single frame.
pub async fn send_message<W>(writer: &mut W, message: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!("Sent {} ({} bytes)", message.kind(), frame.len());
    Ok(())
}

/// Read one message.
///
/// Returns `Ok(None)` when the peer closed the stream before a complete
/// frame arrived. Oversized or undecodable frames are errors; the caller is
/// expected to drop the connection.
pub async fn receive_message<R>(reader: &mut R) -> Result<Option<Message>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if !read_full(reader, &mut header).await? {
        return Ok(None);
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    if !read_full(reader, &mut body).await? {
        warn!("Peer disconnected mid-frame ({} byte payload expected)", len);
        return Ok(None);
    }

    let message = decode_payload(&body)?;
    trace!("Received {} ({} bytes)", message.kind(), len);
    Ok(Some(message))
}

/// Fill `buf` completely. `Ok(false)` means the stream ended first.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}
