//! Error types for frame streaming.
//!
//! Every failure in the crate is a [`StreamError`]. Errors carry structured
//! context and can be classified so callers know whether to drop a single frame
//! or tear down the connection.
//!
//! ## Error Categories
//!
//! - **Protocol Errors**: Malformed or incomplete wire messages. These are local
//!   to one message or frame and never poison other frames or the connection.
//! - **Encoder Errors**: The caller handed the encoder an inconsistent frame.
//! - **Configuration Errors**: Invalid settings rejected at load time.
//! - **I/O and Transport Errors**: Files, sockets and WebSocket failures.
//!
//! ## Frame-local Failures
//!
//! ```rust
//! use pointstream::StreamError;
//!
//! let error = StreamError::IncompleteReassembly { frame_number: 3, received: 2, expected: 5 };
//! if error.is_frame_local() {
//!     // Drop the frame, keep the connection.
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::StreamType;

/// Result type alias for streaming operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for streaming operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Invalid magic bytes: {magic:?}")]
    InvalidMagic { magic: [u8; 4] },

    #[error("Unknown stream type id: {id}")]
    UnknownStreamType { id: u32 },

    #[error("Unknown stream type name: '{name}'")]
    UnknownStreamName { name: String },

    #[error("Size mismatch in {context}: expected {expected} bytes, got {actual}")]
    SizeMismatch { context: &'static str, expected: usize, actual: usize },

    #[error("Message too short for header: {len} bytes")]
    Truncated { len: usize },

    #[error("Missing chunks for frame {frame_number}: got {received}, expected {expected}")]
    IncompleteReassembly { frame_number: u32, received: usize, expected: usize },

    #[error(
        "End-of-frame for {stream_type} frame {frame_number} carries a header for {carried_stream_type} frame {carried_frame_number}"
    )]
    HeaderMismatch {
        stream_type: StreamType,
        frame_number: u32,
        carried_stream_type: StreamType,
        carried_frame_number: u32,
    },

    #[error("Chunk index {index} out of range for frame {frame_number} ({total} chunks)")]
    ChunkOutOfRange { frame_number: u32, index: u32, total: u32 },

    #[error("Reassembly of frame {frame_number} expired after {age:?}")]
    ReassemblyExpired { frame_number: u32, age: Duration },

    #[error("Payload of {actual} values does not match shape {rows}x{cols} ({expected} values)")]
    PayloadShapeInconsistency { rows: u32, cols: u32, expected: usize, actual: usize },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("I/O error: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Recording error: {details}")]
    Recording { details: String },

    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Remote endpoint reported: {message}")]
    Remote { message: String },
}

impl StreamError {
    /// Returns whether this error only affects a single message or frame.
    ///
    /// Frame-local errors are logged and the frame is dropped; the connection
    /// and every other in-flight frame carry on.
    pub fn is_frame_local(&self) -> bool {
        match self {
            StreamError::InvalidMagic { .. } => true,
            StreamError::UnknownStreamType { .. } => true,
            StreamError::SizeMismatch { .. } => true,
            StreamError::Truncated { .. } => true,
            StreamError::IncompleteReassembly { .. } => true,
            StreamError::HeaderMismatch { .. } => true,
            StreamError::ChunkOutOfRange { .. } => true,
            StreamError::ReassemblyExpired { .. } => true,
            StreamError::PayloadShapeInconsistency { .. } => true,
            StreamError::UnknownStreamName { .. } => false,
            StreamError::Config { .. } => false,
            StreamError::Io { .. } => false,
            StreamError::Recording { .. } => false,
            StreamError::Transport { .. } => false,
            StreamError::Remote { .. } => false,
        }
    }

    /// Returns whether retrying the operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::Transport { .. } | StreamError::Io { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::InvalidMagic { .. } => vec![
                "Check that the peer speaks the LIDR binary protocol",
                "Verify the transport delivers whole binary messages",
            ],
            StreamError::UnknownStreamType { .. } | StreamError::UnknownStreamName { .. } => vec![
                "Use one of: range2d, reflectivity2d, points3d, reflectivity3d, combined2d",
                "Check sender and receiver protocol versions match",
            ],
            StreamError::SizeMismatch { .. } | StreamError::Truncated { .. } => vec![
                "Check the transport for truncated or corrupted delivery",
                "Verify the transport does not exceed its message size limit",
            ],
            StreamError::IncompleteReassembly { .. } => vec![
                "Check the transport for dropped messages",
                "Lower the chunk size if the transport rejects large messages",
            ],
            StreamError::HeaderMismatch { .. } => vec![
                "Verify the end-of-frame header is not corrupted",
                "Check the sender does not reuse frame numbers across streams",
            ],
            StreamError::ChunkOutOfRange { .. } => vec![
                "Check the sender's chunk numbering",
                "Verify the chunk header is not corrupted",
            ],
            StreamError::ReassemblyExpired { .. } => vec![
                "Increase the reassembly timeout",
                "Check sender throughput against the configured frame rate",
            ],
            StreamError::PayloadShapeInconsistency { .. } => vec![
                "Ensure payload length equals rows * max(cols, 1)",
                "Use cols = 0 for one-dimensional payloads",
            ],
            StreamError::Config { .. } => vec![
                "Check the configuration file against the documented defaults",
                "Ensure chunk_size is non-zero and max_message_size is at least 64",
            ],
            StreamError::Io { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            StreamError::Recording { .. } => vec![
                "Verify the file was produced by `pointstream record`",
                "Re-record the source if the file is truncated",
            ],
            StreamError::Transport { .. } => vec![
                "Check the server is running and reachable",
                "Verify the URL and stream type path",
                "Retry the connection",
            ],
            StreamError::Remote { .. } => {
                vec!["Inspect the server logs for the reported failure"]
            }
        }
    }

    /// Helper constructor for I/O errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StreamError::Io { path: path.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        StreamError::Config { reason: reason.into() }
    }

    /// Helper constructor for recording format errors.
    pub fn recording(details: impl Into<String>) -> Self {
        StreamError::Recording { details: details.into() }
    }

    /// Helper constructor for transport errors.
    pub fn transport(context: impl Into<String>) -> Self {
        StreamError::Transport { context: context.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StreamError::Transport { context: context.into(), source: Some(Box::new(source)) }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for StreamError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        StreamError::Config { reason: err.to_string() }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::transport_with_source("WebSocket failure", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn messages_carry_their_context(
            frame_number in any::<u32>(),
            received in 0usize..1000,
            expected in 0usize..1000,
            reason in "[a-z ]{1,40}",
        ) {
            let incomplete = StreamError::IncompleteReassembly { frame_number, received, expected };
            let msg = incomplete.to_string();
            prop_assert!(msg.contains(&frame_number.to_string()));
            prop_assert!(msg.contains(&received.to_string()));
            prop_assert!(msg.contains(&expected.to_string()));

            let config = StreamError::config(reason.clone());
            prop_assert!(config.to_string().contains(&reason));
        }

        #[test]
        fn size_mismatch_reports_both_sizes(expected in 32usize..1 << 24, actual in 0usize..1 << 24) {
            let err = StreamError::SizeMismatch { context: "standard message", expected, actual };
            let msg = err.to_string();
            prop_assert!(msg.contains(&expected.to_string()));
            prop_assert!(msg.contains(&actual.to_string()));
            prop_assert!(err.is_frame_local());
        }
    }

    #[test]
    fn protocol_errors_are_frame_local() {
        assert!(StreamError::InvalidMagic { magic: *b"XXXX" }.is_frame_local());
        assert!(StreamError::UnknownStreamType { id: 9 }.is_frame_local());
        assert!(StreamError::Truncated { len: 3 }.is_frame_local());
        assert!(
            StreamError::ChunkOutOfRange { frame_number: 1, index: 4, total: 4 }.is_frame_local()
        );
        assert!(
            StreamError::HeaderMismatch {
                stream_type: StreamType::Points3d,
                frame_number: 3,
                carried_stream_type: StreamType::Range2d,
                carried_frame_number: 3,
            }
            .is_frame_local()
        );
        assert!(!StreamError::config("bad").is_frame_local());
        assert!(!StreamError::transport("closed").is_frame_local());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();

        let error = StreamError::transport("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_suggestions_are_actionable() {
        let errors = [
            StreamError::InvalidMagic { magic: *b"ABCD" },
            StreamError::IncompleteReassembly { frame_number: 0, received: 1, expected: 2 },
            StreamError::PayloadShapeInconsistency { rows: 4, cols: 3, expected: 12, actual: 11 },
            StreamError::transport("refused"),
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn transport_errors_chain_their_source() {
        let io = std::io::Error::other("connection reset");
        let err = StreamError::transport_with_source("send failed", io);
        let source = std::error::Error::source(&err).expect("source should be preserved");
        assert_eq!(source.to_string(), "connection reset");
        assert!(err.is_retryable());
    }

    #[test]
    fn from_io_error_keeps_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test file");
        match StreamError::from(io_err) {
            StreamError::Io { source, .. } => assert_eq!(source.to_string(), "test file"),
            other => panic!("Expected Io error variant, got {other:?}"),
        }
    }
}
