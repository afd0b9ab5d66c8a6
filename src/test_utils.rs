//! Test utilities for frame and scan fixtures
//!
//! Fixtures are generated rather than checked in, so tests and benchmarks
//! work from a clean checkout.

#![cfg(any(test, feature = "benchmark"))]

use crate::protocol::{ChunkingConfig, FrameEncoder};
use crate::providers::synthetic_scan;
use crate::scan::Scan;
use crate::types::{Frame, Shape, StreamType};

/// Grid of a full-size sensor scan (beams x columns).
pub const FULL_SCAN_ROWS: u32 = 128;
pub const FULL_SCAN_COLS: u32 = 1024;

/// Deterministic scan of the given size. Different `index` values give
/// different scans.
pub fn sample_scan(rows: u32, cols: u32, index: u64) -> Scan {
    synthetic_scan(rows, cols, index)
}

/// Full-size scan as produced by a 128-beam sensor.
pub fn full_scan() -> Scan {
    sample_scan(FULL_SCAN_ROWS, FULL_SCAN_COLS, 0)
}

/// The 4-point frame used throughout the protocol documentation:
/// points3d, frame 7, values 1..=12.
pub fn reference_points_frame() -> Frame {
    let payload = (1..=12).map(|v| v as f32).collect();
    Frame::from_payload(StreamType::Points3d, 7, Shape::new(4, 3), payload)
        .expect("reference frame is consistent")
}

/// Flat frame of `values` ascending floats.
pub fn ramp_frame(stream_type: StreamType, frame_number: u32, values: usize) -> Frame {
    let payload = (0..values).map(|v| v as f32 * 0.25).collect();
    Frame::from_payload(stream_type, frame_number, Shape::flat(values as u32), payload)
        .expect("ramp frame is consistent")
}

/// Encoder with small limits so modest frames get chunked.
pub fn small_chunk_encoder(chunk_size: usize) -> FrameEncoder {
    FrameEncoder::new(ChunkingConfig { max_message_size: chunk_size + 32, chunk_size })
        .expect("small chunk config is valid")
}
