//! Stream type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Result, StreamError};

/// Semantic interpretation of a frame's payload.
/// The discriminant is the wire id carried in every message header.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// 2D range image, normalized distances in [-1, 1]
    Range2d = 0,
    /// 2D reflectivity image, normalized intensity in [0, 1]
    Reflectivity2d = 1,
    /// 3D point coordinates `[x, z, -y]` in WebGL order
    Points3d = 2,
    /// Per-point RGB colors derived from reflectivity
    Reflectivity3d = 3,
    /// Flat interleaved `[x, y, z, reflectivity]` in clip space
    Combined2d = 4,
}

impl StreamType {
    /// Every stream type, in wire id order.
    pub const ALL: [StreamType; 5] = [
        StreamType::Range2d,
        StreamType::Reflectivity2d,
        StreamType::Points3d,
        StreamType::Reflectivity3d,
        StreamType::Combined2d,
    ];

    /// Wire id of this stream type.
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Resolve a wire id.
    pub const fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(StreamType::Range2d),
            1 => Ok(StreamType::Reflectivity2d),
            2 => Ok(StreamType::Points3d),
            3 => Ok(StreamType::Reflectivity3d),
            4 => Ok(StreamType::Combined2d),
            _ => Err(StreamError::UnknownStreamType { id }),
        }
    }

    /// Lowercase name, also used as the WebSocket path segment.
    pub const fn name(self) -> &'static str {
        match self {
            StreamType::Range2d => "range2d",
            StreamType::Reflectivity2d => "reflectivity2d",
            StreamType::Points3d => "points3d",
            StreamType::Reflectivity3d => "reflectivity3d",
            StreamType::Combined2d => "combined2d",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            StreamType::Range2d => "2D range image (normalized distances)",
            StreamType::Reflectivity2d => "2D reflectivity image (normalized intensity)",
            StreamType::Points3d => "3D point coordinates in WebGL format",
            StreamType::Reflectivity3d => "3D RGB colors for point cloud",
            StreamType::Combined2d => "Interleaved clip-space coordinates and reflectivity",
        }
    }

    /// WebSocket endpoint path for this stream.
    pub fn endpoint(self) -> String {
        format!("/ws/{}", self.name())
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StreamType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        StreamType::ALL
            .into_iter()
            .find(|st| st.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| StreamError::UnknownStreamName { name: s.to_string() })
    }
}

impl TryFrom<u32> for StreamType {
    type Error = StreamError;

    fn try_from(id: u32) -> Result<Self> {
        StreamType::from_id(id)
    }
}
