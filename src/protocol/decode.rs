//! Standard message decoding

use bytes::Buf;
use tracing::warn;

use super::format::StandardHeader;
use super::message::WireMessage;
use crate::types::Frame;
use crate::{Result, StreamError};

/// Decode one Standard message into a frame.
///
/// A non-zero reserved field is logged and otherwise ignored.
pub fn decode_standard(wire: &[u8]) -> Result<Frame> {
    match WireMessage::parse(wire)? {
        WireMessage::Standard { header, payload } => frame_from_parts(&header, payload),
        other => Err(StreamError::InvalidMagic { magic: magic_of(&other) }),
    }
}

/// Build a frame from a parsed header and its little-endian payload bytes.
pub(crate) fn frame_from_parts(header: &StandardHeader, mut payload: &[u8]) -> Result<Frame> {
    if header.reserved != 0 {
        warn!(
            "Frame {} ({}) has non-zero reserved field {:#010x}",
            header.frame_number, header.stream_type, header.reserved
        );
    }

    let expected = header.shape.checked_byte_len();
    if expected != Some(payload.len()) {
        return Err(StreamError::SizeMismatch {
            context: "frame payload",
            expected: expected.unwrap_or(usize::MAX),
            actual: payload.len(),
        });
    }

    let mut values = Vec::with_capacity(payload.len() / 4);
    while payload.has_remaining() {
        values.push(payload.get_f32_le());
    }

    Frame::new(
        header.stream_type,
        header.frame_number,
        header.shape,
        header.min_val,
        header.max_val,
        values,
    )
}

fn magic_of(message: &WireMessage<'_>) -> [u8; 4] {
    match message {
        WireMessage::Standard { .. } => super::format::STANDARD_MAGIC,
        WireMessage::Chunk { .. } => super::format::CHUNK_MAGIC,
        WireMessage::EndOfFrame { .. } => super::format::END_OF_FRAME_MAGIC,
    }
}
