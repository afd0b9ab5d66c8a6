//! Service configuration loaded from YAML.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```rust
//! use pointstream::config::{Config, SourceKind};
//!
//! let config = Config::from_yaml_str(
//!     r#"
//! bind: "127.0.0.1:9000"
//! fps: 20
//! chunking:
//!   chunk_size: 131072
//! source:
//!   kind: synthetic
//!   rows: 64
//!   cols: 512
//! "#,
//! )?;
//!
//! assert_eq!(config.fps, 20);
//! assert_eq!(config.chunking.max_message_size, 512 * 1024);
//! assert_eq!(config.source.kind, SourceKind::Synthetic);
//! # Ok::<(), pointstream::StreamError>(())
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::{
    ChunkingConfig, DEFAULT_MAX_PENDING, DEFAULT_REASSEMBLY_TIMEOUT, ReassemblyConfig,
};
use crate::scan::check_grid;
use crate::{Result, StreamError};

/// Default frame rate of the server.
pub const DEFAULT_FPS: u32 = 10;

/// Default scan grid of the synthetic source (beams x columns).
pub const DEFAULT_ROWS: u32 = 128;
pub const DEFAULT_COLS: u32 = 1024;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the WebSocket server listens on
    pub bind: SocketAddr,
    /// Frames per second produced by the source
    pub fps: u32,
    pub chunking: ChunkingConfig,
    pub reassembly: ReassemblySettings,
    pub source: SourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            fps: DEFAULT_FPS,
            chunking: ChunkingConfig::default(),
            reassembly: ReassemblySettings::default(),
            source: SourceConfig::default(),
        }
    }
}

/// Reassembly limits as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblySettings {
    pub timeout_ms: u64,
    pub max_pending: usize,
}

impl Default for ReassemblySettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REASSEMBLY_TIMEOUT.as_millis() as u64,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

impl From<ReassemblySettings> for ReassemblyConfig {
    fn from(settings: ReassemblySettings) -> Self {
        ReassemblyConfig {
            timeout: Duration::from_millis(settings.timeout_ms),
            max_pending: settings.max_pending,
        }
    }
}

/// Where scans come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated rotating-sensor scans
    #[default]
    Synthetic,
    /// Scans read back from a recording file
    Replay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub rows: u32,
    pub cols: u32,
    /// Recording to replay, required for `replay`
    pub path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { kind: SourceKind::Synthetic, rows: DEFAULT_ROWS, cols: DEFAULT_COLS, path: None }
    }
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml =
            std::fs::read_to_string(path).map_err(|e| StreamError::io_error(path, e))?;
        let config = Self::from_yaml_str(&yaml)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(StreamError::config("fps must be greater than zero"));
        }
        self.chunking.validate()?;
        if self.reassembly.timeout_ms == 0 {
            return Err(StreamError::config("reassembly.timeout_ms must be greater than zero"));
        }
        if self.reassembly.max_pending == 0 {
            return Err(StreamError::config("reassembly.max_pending must be greater than zero"));
        }
        check_grid(self.source.rows, self.source.cols)?;
        if self.source.kind == SourceKind::Replay && self.source.path.is_none() {
            return Err(StreamError::config("replay source requires source.path"));
        }
        Ok(())
    }

    /// Interval between frames at the configured rate.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}
