//! Length-prefixed JSON framing.
//!
//! Every frame on the wire is a 4-byte big-endian length followed by that
//! many bytes of UTF-8 JSON:
//!
//! ```text
//! ┌──────────┬───────────────┐
//! │ Length   │ JSON body     │
//! │ 4 bytes  │ Length bytes  │
//! │ uint32 BE│               │
//! └──────────┴───────────────┘
//! ```
//!
//! Reading returns `Ok(None)` on a clean end-of-stream (peer closed before
//! delivering a length prefix). A length prefix above the configured cap or
//! a JSON parse failure yields [`RelayError::MalformedFrame`]; either way
//! the connection is no longer usable and the caller should tear it down.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{RelayError, Result};
use crate::protocol::Message;

/// Length prefix size in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default maximum frame body size (16 MiB).
///
/// A length prefix claiming more than this is treated as a malformed
/// frame rather than honoured with an allocation.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Encode a message as a complete frame (prefix + body).
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg)?;
    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Write one framed message to `writer` and flush.
pub async fn write_frame<W>(writer: &mut W, msg: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let buf = encode_frame(msg)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message from `reader`.
///
/// Returns `Ok(None)` when the peer closed the stream before delivering a
/// complete length prefix. A short read mid-frame, a length above
/// `max_frame_len`, or unparseable JSON all fail with `MalformedFrame`.
pub async fn read_frame<R>(reader: &mut R, max_frame_len: u32) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(RelayError::Io(e)),
    }

    let len = u32::from_be_bytes(prefix);
    if len > max_frame_len {
        return Err(RelayError::MalformedFrame(format!(
            "frame length {} exceeds maximum {}",
            len, max_frame_len
        )));
    }

    let mut body = vec![0u8; len as usize];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(RelayError::MalformedFrame(
                "peer closed mid-frame".to_string(),
            ));
        }
        Err(e) => return Err(RelayError::Io(e)),
    }

    let msg = serde_json::from_slice(&body)
        .map_err(|e| RelayError::MalformedFrame(format!("invalid JSON body: {}", e)))?;
    Ok(Some(msg))
}
