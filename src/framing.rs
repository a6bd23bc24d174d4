//! The gRPC length-prefixed message framing: a 1-byte compression flag, a
//! 4-byte big-endian length, then the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

const HEADER_LEN: usize = 5;

/// A length-prefixed gRPC message frame, already split off its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    pub compressed: bool,
    pub payload: Bytes,
}

/// Errors from decoding a length-prefixed frame out of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecodeError {
    /// The declared payload length exceeds `max_message_size`.
    MessageTooLarge { declared: u32, max: u32 },
}

impl std::fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessageTooLarge { declared, max } => {
                write!(f, "message of {declared} bytes exceeds the {max} byte limit")
            }
        }
    }
}

impl std::error::Error for FrameDecodeError {}

/// Encodes `payload` as one gRPC message frame: `[flag:1][len:4][payload]`.
#[must_use]
pub fn encode_message_frame(payload: &[u8], compressed: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u8(u8::from(compressed));
    #[allow(clippy::cast_possible_truncation)]
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Attempts to pull one complete frame off the front of `buf`, per the
/// standard gRPC framing: a 5-byte header (compression flag + length)
/// followed by that many bytes of payload.
///
/// Returns `Ok(None)` if `buf` does not yet hold a complete frame (the
/// caller should wait for more DATA); consumes the frame's bytes from
/// `buf` only on `Ok(Some(_))`.
pub fn decode_message_frame(buf: &mut BytesMut, max_message_size: u32) -> Result<Option<MessageFrame>, FrameDecodeError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let compressed = buf[0] != 0;
    let declared_len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    if declared_len > max_message_size {
        return Err(FrameDecodeError::MessageTooLarge {
            declared: declared_len,
            max: max_message_size,
        });
    }

    let total = HEADER_LEN + declared_len as usize;
    if buf.len() < total {
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(declared_len as usize).freeze();
    Ok(Some(MessageFrame { compressed, payload }))
}
