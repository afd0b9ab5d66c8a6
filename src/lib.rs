//! Chunked binary frame streaming for range-sensor visualization.
//!
//! Pointstream turns sensor scans into typed `f32` frames and carries them over
//! WebSocket using a compact binary protocol. Frames larger than the transport's
//! message limit are split into chunks and reassembled on the receiving side,
//! regardless of the order in which the chunks arrive.
//!
//! # Features
//!
//! - **Binary protocol**: 32-byte little-endian headers, `f32` payloads
//! - **Chunking**: Oversized frames travel as chunks plus an end-of-frame marker
//! - **Reassembly**: Order-independent, bounded in time and memory per connection
//! - **Server and client**: axum WebSocket server, tokio-tungstenite client
//! - **Replay**: Record synthetic scans and stream them back
//!
//! # Quick Start
//!
//! ```rust
//! use pointstream::protocol::{FrameEncoder, Reassembler};
//! use pointstream::types::{Frame, Shape, StreamType};
//!
//! let frame = Frame::from_payload(
//!     StreamType::Points3d,
//!     7,
//!     Shape::new(4, 3),
//!     (1..=12).map(|v| v as f32).collect(),
//! )?;
//!
//! let messages = FrameEncoder::default().encode(&frame)?;
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].len(), 80);
//!
//! let mut reassembler = Reassembler::default();
//! assert_eq!(reassembler.push(&messages[0])?, Some(frame));
//! # Ok::<(), pointstream::StreamError>(())
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire protocol
pub mod protocol;
pub mod receiver;

// Scan sources
pub mod config;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod recording;
pub mod scan;
pub mod stream;

// Transport
pub mod client;
pub mod server;

// Core exports
pub use error::*;
pub use types::{Frame, Shape, StreamType, UpdateRate};

// Main API exports
pub use client::{ClientConfig, StreamClient};
pub use config::Config;
pub use protocol::{ChunkingConfig, FrameEncoder, Reassembler, ReassemblyConfig};
pub use receiver::FrameReceiver;
pub use scan::Scan;
pub use server::StreamServer;
