//! Generated scans of a rotating range sensor

use std::f32::consts::{PI, TAU};

use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::provider::FrameProvider;
use crate::scan::{Scan, check_grid};
use crate::{Result, StreamError};

/// Vertical field of view covered by the beams, in radians (±22.5°).
const HALF_FOV: f32 = PI / 8.0;

/// Build the `index`-th scan of a deterministic synthetic sequence.
///
/// The sensor sits in a rounded room whose walls ripple as the scene
/// rotates a little every scan.
pub fn synthetic_scan(rows: u32, cols: u32, index: u64) -> Scan {
    let cells = rows as usize * cols as usize;
    let mut range_mm = Vec::with_capacity(cells);
    let mut reflectivity = Vec::with_capacity(cells);
    let mut xyz = Vec::with_capacity(cells);
    let phase = (index % 360) as f32 * (TAU / 360.0);

    for row in 0..rows {
        let elevation = if rows > 1 {
            HALF_FOV - 2.0 * HALF_FOV * row as f32 / (rows - 1) as f32
        } else {
            0.0
        };
        for col in 0..cols {
            let azimuth = TAU * col as f32 / cols as f32;
            let meters = 12.0 + 4.0 * (3.0 * azimuth + phase).sin() + 0.02 * row as f32;

            range_mm.push((meters * 1000.0) as u32);
            reflectivity.push(((col + row * 7) as u64 + index * 3) as u8);
            xyz.push([
                meters * elevation.cos() * azimuth.cos(),
                meters * elevation.cos() * azimuth.sin(),
                meters * elevation.sin(),
            ]);
        }
    }

    Scan::from_grids(rows, cols, range_mm, reflectivity, xyz)
}

/// Provider producing [`synthetic_scan`]s at a fixed rate.
pub struct SyntheticProvider {
    rows: u32,
    cols: u32,
    tick_rate: f64,
    interval: Interval,
    produced: u64,
    limit: Option<u64>,
}

impl SyntheticProvider {
    pub fn new(rows: u32, cols: u32, fps: u32) -> Result<Self> {
        check_grid(rows, cols)?;
        if fps == 0 {
            return Err(StreamError::config("fps must be greater than zero"));
        }

        let tick_rate = fps as f64;
        let mut interval = interval(Duration::from_secs_f64(1.0 / tick_rate));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Synthetic source: {}x{} scans at {}Hz", rows, cols, fps);
        Ok(Self { rows, cols, tick_rate, interval, produced: 0, limit: None })
    }

    /// Stop after `limit` scans.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }
}

#[async_trait::async_trait]
impl FrameProvider for SyntheticProvider {
    async fn next_scan(&mut self) -> Result<Option<Scan>> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            debug!("Synthetic source finished after {} scans", self.produced);
            return Ok(None);
        }

        self.interval.tick().await;

        let scan = synthetic_scan(self.rows, self.cols, self.produced);
        trace!("Synthetic scan {}", self.produced);
        self.produced += 1;
        Ok(Some(scan))
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate
    }
}
