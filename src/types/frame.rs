//! Frame type carried by the stream

use super::{Shape, StreamType};
use crate::{Result, StreamError};

/// One complete unit of visualization data, e.g. one sensor scan rendered
/// as a single stream type.
///
/// The payload always holds exactly `shape.len()` values; constructors
/// enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// How the consumer should interpret the payload
    pub stream_type: StreamType,

    /// Sequence number within the stream (gaps and resets are tolerated)
    pub frame_number: u32,

    /// Payload dimensions
    pub shape: Shape,

    /// Informational lower bound of the payload values
    pub min_val: f32,

    /// Informational upper bound of the payload values
    pub max_val: f32,

    /// Row-major payload values
    pub payload: Vec<f32>,
}

impl Frame {
    /// Create a frame with explicit bounds.
    pub fn new(
        stream_type: StreamType,
        frame_number: u32,
        shape: Shape,
        min_val: f32,
        max_val: f32,
        payload: Vec<f32>,
    ) -> Result<Self> {
        let frame = Self { stream_type, frame_number, shape, min_val, max_val, payload };
        frame.check_shape()?;
        Ok(frame)
    }

    /// Create a frame whose bounds are computed from the payload.
    pub fn from_payload(
        stream_type: StreamType,
        frame_number: u32,
        shape: Shape,
        payload: Vec<f32>,
    ) -> Result<Self> {
        let (min_val, max_val) = value_range(&payload);
        Self::new(stream_type, frame_number, shape, min_val, max_val, payload)
    }

    /// Verify `payload.len()` against the declared shape.
    pub fn check_shape(&self) -> Result<()> {
        let expected = self.shape.len();
        if self.payload.len() != expected {
            return Err(StreamError::PayloadShapeInconsistency {
                rows: self.shape.rows,
                cols: self.shape.cols,
                expected,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    /// Payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.payload.len() * 4
    }

    /// Shape as consumers see it: `[rows]` or `[rows, cols]`.
    pub fn dims(&self) -> Vec<u32> {
        self.shape.dims()
    }

    /// Iterate payload rows. Flat payloads yield one value per row.
    pub fn rows(&self) -> std::slice::Chunks<'_, f32> {
        self.payload.chunks(self.shape.cols.max(1) as usize)
    }
}

/// Minimum and maximum of `values`, `(0.0, 0.0)` when empty.
/// NaN values are skipped.
pub fn value_range(values: &[f32]) -> (f32, f32) {
    let mut iter = values.iter().copied().filter(|v| !v.is_nan());
    let Some(first) = iter.next() else {
        return (0.0, 0.0);
    };
    iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
