//! Per-connection receive context

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use tracing::{debug, warn};

use crate::Result;
use crate::protocol::{ReassemblyConfig, ReassemblyStats, Reassembler};
use crate::types::{Frame, StreamType};

/// Callback invoked with each completed frame of one stream type.
pub type FrameHandler = Box<dyn FnMut(Frame) + Send>;

/// Owns the reassembly state of a single connection and routes completed
/// frames to per-stream handlers.
///
/// Dropping the receiver discards any frames still collecting chunks.
pub struct FrameReceiver {
    reassembler: Reassembler,
    handlers: HashMap<StreamType, FrameHandler>,
}

impl FrameReceiver {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self { reassembler: Reassembler::new(config), handlers: HashMap::new() }
    }

    /// Register the consumer for one stream type, replacing any previous one.
    pub fn on_frame<F>(&mut self, stream_type: StreamType, handler: F)
    where
        F: FnMut(Frame) + Send + 'static,
    {
        self.handlers.insert(stream_type, Box::new(handler));
    }

    /// Feed one binary message.
    ///
    /// Completed frames go to the handler registered for their stream type.
    /// A frame with no handler is returned to the caller instead.
    pub fn handle_message(&mut self, wire: &[u8]) -> Result<Option<Frame>> {
        let Some(frame) = self.reassembler.push(wire)? else {
            return Ok(None);
        };

        match self.handlers.get_mut(&frame.stream_type) {
            Some(handler) => {
                handler(frame);
                Ok(None)
            }
            None => Ok(Some(frame)),
        }
    }

    /// Like [`handle_message`](Self::handle_message), but frame-local errors
    /// are logged and swallowed. Other errors are still returned.
    pub fn receive(&mut self, wire: &[u8]) -> Result<Option<Frame>> {
        match self.handle_message(wire) {
            Err(err) if err.is_frame_local() => {
                warn!("Dropped message: {}", err);
                Ok(None)
            }
            other => other,
        }
    }

    /// Drop idle reassembly buffers.
    pub fn expire(&mut self, now: Instant) -> usize {
        self.reassembler.expire(now)
    }

    /// Discard all in-flight frames. Called on connection close.
    pub fn close(&mut self) -> usize {
        let discarded = self.reassembler.clear();
        if discarded > 0 {
            debug!("Connection closed with {} incomplete frames", discarded);
        }
        discarded
    }

    pub fn pending(&self) -> usize {
        self.reassembler.pending()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.reassembler.stats()
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new(ReassemblyConfig::default())
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FrameReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handled: Vec<_> = self.handlers.keys().copied().collect();
        handled.sort();
        f.debug_struct("FrameReceiver")
            .field("reassembler", &self.reassembler)
            .field("handlers", &handled)
            .finish()
    }
}
