//! Frame encoding and chunking

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::format::{ChunkHeader, END_OF_FRAME_LEN, EndOfFrameHeader, HEADER_LEN, StandardHeader};
use crate::types::Frame;
use crate::{Result, StreamError};

/// Default message size limit above which frames are chunked (512 KiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512 * 1024;

/// Default payload bytes carried per chunk (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Size thresholds for the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Largest message sent unchunked, header included
    pub max_message_size: usize,
    /// Payload bytes per chunk message
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_message_size: DEFAULT_MAX_MESSAGE_SIZE, chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl ChunkingConfig {
    /// Every message the encoder emits must fit within `max_message_size`,
    /// chunk and end-of-frame messages included.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(StreamError::config("chunk_size must be non-zero"));
        }
        if self.max_message_size < END_OF_FRAME_LEN {
            return Err(StreamError::config(format!(
                "max_message_size must be at least {END_OF_FRAME_LEN} bytes, got {}",
                self.max_message_size
            )));
        }
        if self.chunk_size > self.max_message_size - HEADER_LEN {
            return Err(StreamError::config(format!(
                "chunk_size {} plus the {HEADER_LEN}-byte header exceeds max_message_size {}",
                self.chunk_size, self.max_message_size
            )));
        }
        Ok(())
    }
}

/// How a frame will go out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePlan {
    /// One message of `message_len` bytes
    Standard { message_len: usize },
    /// `chunks` chunk messages covering `payload_len` bytes, then an end marker
    Chunked { payload_len: usize, chunks: usize },
}

impl EncodePlan {
    /// Number of messages the plan produces.
    pub fn message_count(&self) -> usize {
        match self {
            EncodePlan::Standard { .. } => 1,
            EncodePlan::Chunked { chunks, .. } => chunks + 1,
        }
    }
}

/// Stateless frame encoder.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    config: ChunkingConfig,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self { config: ChunkingConfig::default() }
    }
}

impl FrameEncoder {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Decide between a single message and chunking.
    /// The threshold is inclusive: a frame of exactly `max_message_size` bytes is not chunked.
    pub fn plan(&self, frame: &Frame) -> Result<EncodePlan> {
        frame.check_shape()?;
        let payload_len = frame.byte_len();
        let message_len = HEADER_LEN + payload_len;

        if message_len <= self.config.max_message_size {
            return Ok(EncodePlan::Standard { message_len });
        }

        if payload_len > u32::MAX as usize {
            return Err(StreamError::SizeMismatch {
                context: "payload exceeds the 32-bit data size field",
                expected: u32::MAX as usize,
                actual: payload_len,
            });
        }

        Ok(EncodePlan::Chunked { payload_len, chunks: payload_len.div_ceil(self.config.chunk_size) })
    }

    /// Encode a frame into the ordered messages to send.
    pub fn encode(&self, frame: &Frame) -> Result<Vec<Bytes>> {
        match self.plan(frame)? {
            EncodePlan::Standard { message_len } => {
                trace!(
                    "Encoding {} frame {} as one {} byte message",
                    frame.stream_type, frame.frame_number, message_len
                );
                Ok(vec![encode_standard_unchecked(frame)])
            }
            EncodePlan::Chunked { payload_len, chunks } => {
                debug!(
                    "Chunking {} frame {}: {} bytes -> {} chunks",
                    frame.stream_type,
                    frame.frame_number,
                    HEADER_LEN + payload_len,
                    chunks
                );
                Ok(self.encode_chunked(frame, payload_len, chunks))
            }
        }
    }

    fn encode_chunked(&self, frame: &Frame, payload_len: usize, chunks: usize) -> Vec<Bytes> {
        let payload = payload_bytes(&frame.payload);
        let chunk_size = self.config.chunk_size;
        let mut messages = Vec::with_capacity(chunks + 1);

        for (index, data) in payload.chunks(chunk_size).enumerate() {
            let start = index * chunk_size;
            let header = ChunkHeader {
                stream_type: frame.stream_type,
                frame_number: frame.frame_number,
                chunk_index: index as u32,
                total_chunks: chunks as u32,
                start_offset: start as f32,
                end_offset: (start + data.len()) as f32,
                chunk_len: data.len() as u32,
            };
            let mut out = BytesMut::with_capacity(HEADER_LEN + data.len());
            header.write_to(&mut out);
            out.put_slice(data);
            messages.push(out.freeze());
        }

        let end = EndOfFrameHeader {
            stream_type: frame.stream_type,
            frame_number: frame.frame_number,
            data_size: payload_len as u32,
            total_chunks: chunks as u32,
        };
        let mut out = BytesMut::with_capacity(END_OF_FRAME_LEN);
        end.write_to(&mut out);
        standard_header(frame).write_to(&mut out);
        messages.push(out.freeze());

        messages
    }
}

/// Encode a frame as a single Standard message regardless of size.
pub fn encode_standard(frame: &Frame) -> Result<Bytes> {
    frame.check_shape()?;
    Ok(encode_standard_unchecked(frame))
}

fn encode_standard_unchecked(frame: &Frame) -> Bytes {
    let mut out = BytesMut::with_capacity(HEADER_LEN + frame.byte_len());
    standard_header(frame).write_to(&mut out);
    for value in &frame.payload {
        out.put_f32_le(*value);
    }
    out.freeze()
}

fn standard_header(frame: &Frame) -> StandardHeader {
    StandardHeader {
        stream_type: frame.stream_type,
        frame_number: frame.frame_number,
        shape: frame.shape,
        min_val: frame.min_val,
        max_val: frame.max_val,
        reserved: 0,
    }
}

fn payload_bytes(values: &[f32]) -> Bytes {
    let mut out = BytesMut::with_capacity(values.len() * 4);
    for value in values {
        out.put_f32_le(*value);
    }
    out.freeze()
}
