//! Replay provider for scan recordings

use std::path::{Path, PathBuf};

use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::Result;
use crate::provider::FrameProvider;
use crate::recording::{RecordingHeader, RecordingReader};
use crate::scan::Scan;

/// Replay provider that reads from a recording file
pub struct ReplayProvider {
    /// Recording reader
    reader: RecordingReader,

    /// Playback speed multiplier (1.0 = normal, 2.0 = double speed)
    speed: f64,

    /// Frame pacing interval
    interval: Interval,

    /// Native tick rate from the recording
    tick_rate: f64,

    /// Start over at the end of the file
    looping: bool,
}

impl ReplayProvider {
    /// Create a new replay provider from a recording file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = RecordingReader::open(path)?;
        let header = *reader.header();
        let tick_rate = header.tick_rate as f64;

        info!(
            "Opened recording {}: {}x{} scans at {}Hz",
            reader.path().display(),
            header.rows,
            header.cols,
            tick_rate
        );

        Ok(Self { reader, speed: 1.0, interval: pacing(tick_rate), tick_rate, looping: false })
    }

    pub fn header(&self) -> &RecordingHeader {
        self.reader.header()
    }

    /// Set playback speed
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.clamp(0.1, 10.0);
        self.interval = pacing(self.tick_rate * self.speed);
        debug!("Playback speed set to {}x", self.speed);
    }

    /// Restart from the first scan instead of ending
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Current playback time in seconds
    pub fn current_time(&self) -> f64 {
        self.reader.scans_read() as f64 / self.tick_rate
    }

    fn rewind(&mut self) -> Result<()> {
        let path: PathBuf = self.reader.path().to_path_buf();
        self.reader = RecordingReader::open(&path)?;
        debug!("Rewound recording {}", path.display());
        Ok(())
    }
}

fn pacing(rate: f64) -> Interval {
    let mut interval = interval(Duration::from_secs_f64(1.0 / rate));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[async_trait::async_trait]
impl FrameProvider for ReplayProvider {
    async fn next_scan(&mut self) -> Result<Option<Scan>> {
        let mut scan = self.reader.read_scan()?;

        if scan.is_none() && self.looping && self.reader.scans_read() > 0 {
            self.rewind()?;
            scan = self.reader.read_scan()?;
        }

        let Some(scan) = scan else {
            debug!("Reached end of replay after {} scans", self.reader.scans_read());
            return Ok(None);
        };

        // Wait for next frame timing (pacing)
        self.interval.tick().await;

        trace!("Replay scan {} at {:.2}s", self.reader.scans_read(), self.current_time());
        Ok(Some(scan))
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate * self.speed
    }
}
