//! Driver spawns and manages the scan reader task

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::provider::FrameProvider;
use crate::scan::Scan;

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Latest scan; `None` before the first scan and after the source ends
    pub scans: watch::Receiver<Option<Arc<Scan>>>,
    /// Native scan rate of the provider in Hz
    pub tick_rate: f64,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver owns the provider and publishes its scans
///
/// Every subscriber sees the most recent scan; slow subscribers skip scans
/// rather than queueing them.
pub struct Driver;

impl Driver {
    /// Spawn the reader task for the given provider
    pub fn spawn<P>(provider: P) -> DriverChannels
    where
        P: FrameProvider,
    {
        Self::spawn_with_cancel(provider, CancellationToken::new())
    }

    /// Spawn the reader task, stopping when `cancel` fires
    pub fn spawn_with_cancel<P>(provider: P, cancel: CancellationToken) -> DriverChannels
    where
        P: FrameProvider,
    {
        let (scan_tx, scan_rx) = watch::channel(None);
        let tick_rate = provider.tick_rate();
        let cancel_reader = cancel.clone();

        tokio::spawn(async move {
            Self::scan_reader_task(provider, scan_tx, cancel_reader).await;
        });

        DriverChannels { scans: scan_rx, tick_rate, cancel }
    }

    async fn scan_reader_task<P>(
        mut provider: P,
        scan_tx: watch::Sender<Option<Arc<Scan>>>,
        cancel: CancellationToken,
    ) where
        P: FrameProvider,
    {
        info!("Scan reader task started at {}Hz", provider.tick_rate());
        let mut scan_count = 0u64;
        let mut error_count = 0u32;
        const MAX_ERRORS: u32 = 10;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Scan reader cancelled");
                    break;
                }
                result = provider.next_scan() => result,
            };

            match result {
                Ok(Some(scan)) => {
                    scan_count += 1;
                    error_count = 0;
                    trace!("Scan {}: {}x{}", scan_count, scan.rows(), scan.cols());

                    if scan_tx.send(Some(Arc::new(scan))).is_err() {
                        debug!("All scan receivers dropped, shutting down");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Provider ended after {} scans", scan_count);
                    let _ = scan_tx.send(None);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        let _ = scan_tx.send(None);
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        info!("Scan reader task ended ({} scans)", scan_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SyntheticProvider;
    use crate::{Result, StreamError};

    struct FailingProvider {
        failures: u32,
        calls: u32,
    }

    #[async_trait::async_trait]
    impl FrameProvider for FailingProvider {
        async fn next_scan(&mut self) -> Result<Option<Scan>> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err(StreamError::recording("corrupt record"))
            } else {
                Ok(Some(crate::test_utils::sample_scan(2, 2, self.calls as u64)))
            }
        }

        fn tick_rate(&self) -> f64 {
            1.0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_scans_then_end_of_stream() {
        let provider = SyntheticProvider::new(2, 4, 10).unwrap().with_limit(2);
        let mut channels = Driver::spawn(provider);
        assert_eq!(channels.tick_rate, 10.0);

        let mut seen = 0;
        loop {
            channels.scans.changed().await.unwrap();
            match channels.scans.borrow_and_update().clone() {
                Some(scan) => {
                    assert_eq!(scan.len(), 8);
                    seen += 1;
                }
                None => break,
            }
        }
        assert!(seen >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_from_transient_errors() {
        let mut channels = Driver::spawn(FailingProvider { failures: 3, calls: 0 });
        channels.scans.changed().await.unwrap();
        assert!(channels.scans.borrow().is_some());
        channels.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_repeated_errors() {
        let mut channels = Driver::spawn(FailingProvider { failures: u32::MAX, calls: 0 });
        channels.scans.changed().await.unwrap();
        assert!(channels.scans.borrow().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_reader() {
        let provider = SyntheticProvider::new(2, 2, 10).unwrap();
        let mut channels = Driver::spawn(provider);
        channels.scans.changed().await.unwrap();
        channels.cancel.cancel();

        // Sender is dropped once the task exits
        while channels.scans.changed().await.is_ok() {}
    }
}
