//! Wire format for one protocol message.
//!
//! ```text
//! [tag:4][payload_len:4][payload:N]
//! ```
//!
//! The tag is four ASCII bytes, the payload length a big-endian unsigned
//! 32-bit integer. A zero-length payload is a complete frame on its own.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const TAG_LEN: usize = 4;
pub const HEADER_LEN: usize = TAG_LEN + 4;

/// Errors produced while decoding a frame header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("truncated header: need 8 bytes, got {0}")]
    TruncatedHeader(usize),
}

/// A decoded header: the raw command tag and the payload length that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: [u8; TAG_LEN],
    pub payload_len: u32,
}

/// The commands the room understands, plus a passthrough for tags it does
/// not. Unknown tags keep their raw bytes so they can be logged and
/// re-encoded unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Name,
    Chat,
    Quit,
    Unknown([u8; TAG_LEN]),
}

impl Command {
    pub fn from_tag(tag: [u8; TAG_LEN]) -> Self {
        match &tag {
            b"name" => Command::Name,
            b"chat" => Command::Chat,
            b"quit" => Command::Quit,
            _ => Command::Unknown(tag),
        }
    }

    pub fn tag(&self) -> [u8; TAG_LEN] {
        match *self {
            Command::Name => *b"name",
            Command::Chat => *b"chat",
            Command::Quit => *b"quit",
            Command::Unknown(tag) => tag,
        }
    }
}

pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::TruncatedHeader(bytes.len()));
    }

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&bytes[..TAG_LEN]);

    let mut len = [0u8; 4];
    len.copy_from_slice(&bytes[TAG_LEN..HEADER_LEN]);

    Ok(FrameHeader {
        tag,
        payload_len: u32::from_be_bytes(len),
    })
}

/// Encodes tag + length prefix + payload as one buffer, so the frame goes
/// out as a single logical write.
pub fn encode_frame(tag: [u8; TAG_LEN], payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(&tag);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}
