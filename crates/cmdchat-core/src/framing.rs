//! Frame codec — the on-wire format for every message exchanged by cmdchat.
//!
//! A frame is a 4-byte big-endian length prefix followed by exactly that many
//! bytes of UTF-8 JSON, decoding to a top-level object. This IS the protocol:
//! every cmdchat message, handshake or encrypted envelope alike, goes over
//! the wire as one frame. Changing the prefix width or the size ceiling is a
//! wire-breaking change.

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length prefix width, in bytes.
pub const LENGTH_PREFIX: usize = 4;

/// Largest permitted frame body, in bytes. A length outside `1..=MAX_FRAME_SIZE`
/// is a framing error, never silently clamped.
pub const MAX_FRAME_SIZE: u32 = 65_536;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame length {0} outside the permitted 1..={MAX_FRAME_SIZE} range")]
    BadLength(u32),
    #[error("peer closed the connection mid-frame")]
    ShortRead,
    #[error("frame body is not valid UTF-8 JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame decoded to a JSON value that is not an object")]
    NotAnObject,
    #[error("I/O error while framing: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads exactly one frame and parses its body as a JSON object.
///
/// A short read at any point (including within the length prefix) is reported
/// as [`FramingError::ShortRead`], which callers treat identically to a clean
/// peer close — the dispatcher does not distinguish "EOF before any bytes"
/// from "EOF mid-frame".
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Value, FramingError> {
    let mut len_buf = [0u8; LENGTH_PREFIX];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::ShortRead),
        Err(e) => return Err(FramingError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf);
    if len == 0 || len > MAX_FRAME_SIZE {
        return Err(FramingError::BadLength(len));
    }

    let mut body = vec![0u8; len as usize];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FramingError::ShortRead),
        Err(e) => return Err(FramingError::Io(e)),
    }

    let value: Value = serde_json::from_slice(&body)?;
    if !value.is_object() {
        return Err(FramingError::NotAnObject);
    }
    Ok(value)
}

/// Serializes `value` compactly and writes it as one frame.
///
/// Callers are required to hold the session write lock for the duration of
/// this call — the codec itself does not serialize concurrent writers, it
/// only guarantees that a single call emits its bytes without interleaving
/// with anything else written through the same `writer` reference.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &Value,
) -> Result<(), FramingError> {
    let body = serde_json::to_vec(value)?;
    if body.is_empty() || body.len() as u64 > MAX_FRAME_SIZE as u64 {
        return Err(FramingError::BadLength(body.len() as u32));
    }
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
