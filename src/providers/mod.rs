//! Scan source implementations

mod replay;
mod synthetic;

pub use replay::ReplayProvider;
pub use synthetic::{SyntheticProvider, synthetic_scan};

use crate::config::{Config, SourceKind};
use crate::provider::FrameProvider;
use crate::{Result, StreamError};

/// Build the provider described by a configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn FrameProvider>> {
    match config.source.kind {
        SourceKind::Synthetic => Ok(Box::new(SyntheticProvider::new(
            config.source.rows,
            config.source.cols,
            config.fps,
        )?)),
        SourceKind::Replay => {
            let path = config
                .source
                .path
                .as_ref()
                .ok_or_else(|| StreamError::config("replay source requires source.path"))?;
            let mut provider = ReplayProvider::new(path)?;
            provider.set_looping(true);
            Ok(Box::new(provider))
        }
    }
}
