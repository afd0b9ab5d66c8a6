//! Binary wire protocol: framing, chunking and reassembly.
//!
//! A frame travels either as one `Standard` message or, when the message
//! would exceed [`ChunkingConfig::max_message_size`], as a run of `Chunk`
//! messages followed by an `EndOfFrame` marker carrying the original header.
//!
//! ```rust
//! use pointstream::protocol::{ChunkingConfig, FrameEncoder, Reassembler};
//! use pointstream::types::{Frame, Shape, StreamType};
//!
//! let encoder = FrameEncoder::new(ChunkingConfig { max_message_size: 128, chunk_size: 64 })?;
//! let frame = Frame::from_payload(StreamType::Range2d, 1, Shape::new(8, 8), vec![0.5; 64])?;
//!
//! let messages = encoder.encode(&frame)?;
//! assert_eq!(messages.len(), 5); // 4 chunks + end-of-frame
//!
//! let mut reassembler = Reassembler::default();
//! let (end, chunks) = messages.split_last().unwrap();
//! for chunk in chunks.iter().rev() {
//!     assert!(reassembler.push(chunk)?.is_none());
//! }
//! assert_eq!(reassembler.push(end)?, Some(frame));
//! # Ok::<(), pointstream::StreamError>(())
//! ```

mod decode;
mod encode;
mod format;
mod message;
mod reassembly;

pub use decode::decode_standard;
pub use encode::{
    ChunkingConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_MESSAGE_SIZE, EncodePlan, FrameEncoder,
    encode_standard,
};
pub use format::{
    CHUNK_MAGIC, ChunkHeader, END_OF_FRAME_LEN, END_OF_FRAME_MAGIC, EndOfFrameHeader, HEADER_LEN,
    STANDARD_MAGIC, StandardHeader,
};
pub use message::{WireMessage, describe_message};
pub use reassembly::{
    DEFAULT_MAX_PENDING, DEFAULT_REASSEMBLY_TIMEOUT, ReassemblyConfig, ReassemblyStats,
    Reassembler,
};
