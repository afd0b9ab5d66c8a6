//! Wire message variants

use std::fmt;

use super::format::{
    CHUNK_MAGIC, ChunkHeader, END_OF_FRAME_LEN, END_OF_FRAME_MAGIC, EndOfFrameHeader, HEADER_LEN,
    STANDARD_MAGIC, StandardHeader, read_magic,
};
use crate::types::StreamType;
use crate::{Result, StreamError};

/// A parsed wire message borrowing its body from the received bytes.
///
/// Parsing checks magic, stream type and every length the header declares,
/// so a `WireMessage` is always structurally sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireMessage<'a> {
    /// Header plus the complete payload
    Standard { header: StandardHeader, payload: &'a [u8] },

    /// Header plus one contiguous slice of the payload bytes
    Chunk { header: ChunkHeader, data: &'a [u8] },

    /// End marker carrying the raw 32-byte Standard header of the frame
    EndOfFrame { header: EndOfFrameHeader, original: &'a [u8] },
}

impl<'a> WireMessage<'a> {
    /// Parse a single binary message.
    pub fn parse(wire: &'a [u8]) -> Result<Self> {
        match read_magic(wire)? {
            STANDARD_MAGIC => {
                let header = StandardHeader::parse(wire)?;
                let expected = header.message_len().unwrap_or(usize::MAX);
                if wire.len() != expected {
                    return Err(StreamError::SizeMismatch {
                        context: "standard message",
                        expected,
                        actual: wire.len(),
                    });
                }
                Ok(WireMessage::Standard { header, payload: &wire[HEADER_LEN..] })
            }
            CHUNK_MAGIC => {
                let header = ChunkHeader::parse(wire)?;
                let expected = HEADER_LEN + header.chunk_len as usize;
                if wire.len() != expected {
                    return Err(StreamError::SizeMismatch {
                        context: "chunk message",
                        expected,
                        actual: wire.len(),
                    });
                }
                Ok(WireMessage::Chunk { header, data: &wire[HEADER_LEN..] })
            }
            END_OF_FRAME_MAGIC => {
                let header = EndOfFrameHeader::parse(wire)?;
                if wire.len() != END_OF_FRAME_LEN {
                    return Err(StreamError::SizeMismatch {
                        context: "end-of-frame message",
                        expected: END_OF_FRAME_LEN,
                        actual: wire.len(),
                    });
                }
                Ok(WireMessage::EndOfFrame { header, original: &wire[HEADER_LEN..] })
            }
            magic => Err(StreamError::InvalidMagic { magic }),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        match self {
            WireMessage::Standard { header, .. } => header.stream_type,
            WireMessage::Chunk { header, .. } => header.stream_type,
            WireMessage::EndOfFrame { header, .. } => header.stream_type,
        }
    }

    pub fn frame_number(&self) -> u32 {
        match self {
            WireMessage::Standard { header, .. } => header.frame_number,
            WireMessage::Chunk { header, .. } => header.frame_number,
            WireMessage::EndOfFrame { header, .. } => header.frame_number,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Standard { .. } => "standard",
            WireMessage::Chunk { .. } => "chunk",
            WireMessage::EndOfFrame { .. } => "end-of-frame",
        }
    }
}

/// One-line summary of a binary message.
pub fn describe_message(wire: &[u8]) -> Result<String> {
    WireMessage::parse(wire).map(|message| message.to_string())
}

impl fmt::Display for WireMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMessage::Standard { header, payload } => write!(
                f,
                "LIDR {} frame {} shape {} range [{:.3}, {:.3}] ({} bytes)",
                header.stream_type,
                header.frame_number,
                header.shape,
                header.min_val,
                header.max_val,
                payload.len()
            ),
            WireMessage::Chunk { header, data } => write!(
                f,
                "CHUN {} frame {} chunk {}/{} ({} bytes)",
                header.stream_type,
                header.frame_number,
                header.chunk_index + 1,
                header.total_chunks,
                data.len()
            ),
            WireMessage::EndOfFrame { header, .. } => write!(
                f,
                "EOFR {} frame {} ({} bytes in {} chunks)",
                header.stream_type, header.frame_number, header.data_size, header.total_chunks
            ),
        }
    }
}
