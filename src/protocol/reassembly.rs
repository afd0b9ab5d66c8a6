//! Chunk reassembly
//!
//! A [`Reassembler`] holds one buffer per `(stream type, frame number)`. Chunks
//! are stored by index and concatenated in index order once the end-of-frame
//! marker arrives, so arrival order never matters. A frame is only delivered
//! when every chunk is present; otherwise the buffer is discarded.
//!
//! Buffers are bounded two ways: [`Reassembler::expire`] drops buffers that
//! have not seen a chunk within the configured timeout, and starting a new
//! buffer beyond `max_pending` evicts the least recently updated one.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::decode::frame_from_parts;
use super::format::{ChunkHeader, EndOfFrameHeader, HEADER_LEN, StandardHeader};
use super::message::WireMessage;
use crate::types::{Frame, StreamType};
use crate::{Result, StreamError};

/// Default lifetime of an idle reassembly buffer.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of frames that may be collecting at once.
pub const DEFAULT_MAX_PENDING: usize = 64;

/// Limits on in-flight reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyConfig {
    /// Idle time after which a collecting buffer is dropped
    pub timeout: Duration,
    /// Maximum number of collecting buffers
    pub max_pending: usize,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self { timeout: DEFAULT_REASSEMBLY_TIMEOUT, max_pending: DEFAULT_MAX_PENDING }
    }
}

/// Counters describing what a reassembler has processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyStats {
    pub chunks_received: u64,
    pub frames_completed: u64,
    pub standard_frames: u64,
    pub dropped_incomplete: u64,
    pub expired: u64,
    pub evicted: u64,
    pub bytes_reassembled: u64,
}

type BufferKey = (StreamType, u32);

#[derive(Debug)]
struct ChunkBuffer {
    total_chunks: u32,
    chunks: BTreeMap<u32, Bytes>,
    created: Instant,
    updated: Instant,
}

impl ChunkBuffer {
    fn new(total_chunks: u32, now: Instant) -> Self {
        Self { total_chunks, chunks: BTreeMap::new(), created: now, updated: now }
    }

    fn byte_len(&self) -> usize {
        self.chunks.values().map(Bytes::len).sum()
    }
}

/// Per-connection frame decoder and chunk reassembler.
#[derive(Debug, Default)]
pub struct Reassembler {
    config: ReassemblyConfig,
    buffers: HashMap<BufferKey, ChunkBuffer>,
    stats: ReassemblyStats,
}

impl Reassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self { config, buffers: HashMap::new(), stats: ReassemblyStats::default() }
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    /// Handle one wire message. Returns the frame it completes, if any.
    pub fn push(&mut self, wire: &[u8]) -> Result<Option<Frame>> {
        self.push_at(wire, Instant::now())
    }

    /// Same as [`push`](Self::push) with an explicit clock.
    pub fn push_at(&mut self, wire: &[u8], now: Instant) -> Result<Option<Frame>> {
        let message = WireMessage::parse(wire)?;
        trace!("Received {}", message);

        match message {
            WireMessage::Standard { header, payload } => {
                let frame = frame_from_parts(&header, payload)?;
                self.stats.standard_frames += 1;
                Ok(Some(frame))
            }
            WireMessage::Chunk { header, data } => {
                self.store_chunk(&header, data, now)?;
                Ok(None)
            }
            WireMessage::EndOfFrame { header, original } => {
                self.complete(&header, original).map(Some)
            }
        }
    }

    fn store_chunk(&mut self, header: &ChunkHeader, data: &[u8], now: Instant) -> Result<()> {
        if header.chunk_index >= header.total_chunks {
            return Err(StreamError::ChunkOutOfRange {
                frame_number: header.frame_number,
                index: header.chunk_index,
                total: header.total_chunks,
            });
        }

        let key = (header.stream_type, header.frame_number);
        match self.buffers.get(&key) {
            Some(existing) if existing.total_chunks != header.total_chunks => {
                debug!(
                    "Frame {} ({}) restarted with {} chunks (was {}), replacing buffer",
                    header.frame_number,
                    header.stream_type,
                    header.total_chunks,
                    existing.total_chunks
                );
                self.buffers.insert(key, ChunkBuffer::new(header.total_chunks, now));
            }
            Some(_) => {}
            None => {
                if self.buffers.len() >= self.config.max_pending {
                    self.evict_oldest();
                }
                self.buffers.insert(key, ChunkBuffer::new(header.total_chunks, now));
            }
        }

        if let Some(buffer) = self.buffers.get_mut(&key) {
            buffer.chunks.insert(header.chunk_index, Bytes::copy_from_slice(data));
            buffer.updated = now;
        }
        self.stats.chunks_received += 1;
        Ok(())
    }

    fn complete(&mut self, header: &EndOfFrameHeader, original: &[u8]) -> Result<Frame> {
        let key = (header.stream_type, header.frame_number);
        let Some(buffer) = self.buffers.remove(&key) else {
            self.stats.dropped_incomplete += 1;
            return Err(StreamError::IncompleteReassembly {
                frame_number: header.frame_number,
                received: 0,
                expected: header.total_chunks as usize,
            });
        };

        if buffer.chunks.len() != buffer.total_chunks as usize {
            self.stats.dropped_incomplete += 1;
            return Err(StreamError::IncompleteReassembly {
                frame_number: header.frame_number,
                received: buffer.chunks.len(),
                expected: buffer.total_chunks as usize,
            });
        }

        let original_header = StandardHeader::parse(original)?;
        if original_header.stream_type != header.stream_type
            || original_header.frame_number != header.frame_number
        {
            self.stats.dropped_incomplete += 1;
            return Err(StreamError::HeaderMismatch {
                stream_type: header.stream_type,
                frame_number: header.frame_number,
                carried_stream_type: original_header.stream_type,
                carried_frame_number: original_header.frame_number,
            });
        }
        let mut payload = BytesMut::with_capacity(buffer.byte_len());
        for chunk in buffer.chunks.values() {
            payload.put_slice(chunk);
        }

        if payload.len() != header.data_size as usize {
            self.stats.dropped_incomplete += 1;
            return Err(StreamError::SizeMismatch {
                context: "reassembled payload",
                expected: header.data_size as usize,
                actual: payload.len(),
            });
        }

        let frame = frame_from_parts(&original_header, &payload)?;
        debug!(
            "Reassembled {} frame {} from {} chunks ({} bytes) in {:?}",
            frame.stream_type,
            frame.frame_number,
            buffer.total_chunks,
            HEADER_LEN + payload.len(),
            buffer.updated.saturating_duration_since(buffer.created)
        );
        self.stats.frames_completed += 1;
        self.stats.bytes_reassembled += payload.len() as u64;
        Ok(frame)
    }

    fn evict_oldest(&mut self) {
        let oldest = self.buffers.iter().min_by_key(|(_, buffer)| buffer.updated).map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.buffers.remove(&key);
            self.stats.evicted += 1;
            warn!(
                "Evicted {} frame {} to stay within {} pending frames",
                key.0, key.1, self.config.max_pending
            );
        }
    }

    /// Drop buffers idle for longer than the timeout. Returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.config.timeout;
        let before = self.buffers.len();

        self.buffers.retain(|(stream_type, frame_number), buffer| {
            let age = now.saturating_duration_since(buffer.updated);
            if age <= timeout {
                return true;
            }
            let err = StreamError::ReassemblyExpired { frame_number: *frame_number, age };
            warn!(
                "Dropping {} frame {} with {}/{} chunks: {}",
                stream_type,
                frame_number,
                buffer.chunks.len(),
                buffer.total_chunks,
                err
            );
            false
        });

        let dropped = before - self.buffers.len();
        self.stats.expired += dropped as u64;
        dropped
    }

    /// Discard all in-flight buffers. Returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.buffers.len();
        if discarded > 0 {
            debug!("Discarding {} in-flight frames", discarded);
        }
        self.buffers.clear();
        discarded
    }

    /// Number of frames currently collecting chunks.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }
}
