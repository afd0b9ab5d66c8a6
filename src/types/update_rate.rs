//! Delivery rate control for decoded frame streams

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::StreamError;

/// Rate at which a client hands decoded frames to its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every frame as it completes
    #[default]
    Native,

    /// At most this many frames per second, latest wins.
    /// A limit at or above the source rate is treated as Native.
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the sender's frame rate
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if any, after normalization
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

impl FromStr for UpdateRate {
    type Err = StreamError;

    /// Accepts `native` or a positive integer Hz limit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(UpdateRate::Native);
        }
        match s.parse::<u32>() {
            Ok(hz) if hz > 0 => Ok(UpdateRate::Max(hz)),
            _ => Err(StreamError::config(format!("invalid update rate '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_above_source_is_native() {
        assert_eq!(UpdateRate::Max(30).normalize(10.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(5).normalize(10.0), UpdateRate::Max(5));
        assert_eq!(UpdateRate::Max(0).normalize(10.0), UpdateRate::Native);
    }

    #[test]
    fn interval_matches_limit() {
        assert_eq!(UpdateRate::Max(4).throttle_interval(10.0), Some(Duration::from_millis(250)));
        assert_eq!(UpdateRate::Native.throttle_interval(10.0), None);
    }

    #[test]
    fn parses_cli_values() {
        assert_eq!("native".parse::<UpdateRate>().unwrap(), UpdateRate::Native);
        assert_eq!("5".parse::<UpdateRate>().unwrap(), UpdateRate::Max(5));
        assert!("0".parse::<UpdateRate>().is_err());
        assert!("fast".parse::<UpdateRate>().is_err());
    }
}
