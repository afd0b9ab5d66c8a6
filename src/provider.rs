//! Provider trait for scan sources

use crate::Result;
use crate::scan::Scan;

/// Trait for scan sources
///
/// Providers abstract over where scans come from (generated, recorded) and
/// handle their own pacing internally.
#[async_trait::async_trait]
pub trait FrameProvider: Send + 'static {
    /// Get the next scan
    ///
    /// Returns:
    /// - `Ok(Some(scan))` - New scan available
    /// - `Ok(None)` - Source exhausted (normal termination)
    /// - `Err(e)` - Error occurred
    async fn next_scan(&mut self) -> Result<Option<Scan>>;

    /// Get the native scan rate in Hz
    fn tick_rate(&self) -> f64;
}

#[async_trait::async_trait]
impl FrameProvider for Box<dyn FrameProvider> {
    async fn next_scan(&mut self) -> Result<Option<Scan>> {
        (**self).next_scan().await
    }

    fn tick_rate(&self) -> f64 {
        (**self).tick_rate()
    }
}
