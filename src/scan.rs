//! Sensor scans and their conversion into stream frames.
//!
//! A [`Scan`] is one full rotation of a spinning range sensor laid out as a
//! `rows × cols` grid (beams × azimuth columns). Each stream type renders the
//! same scan differently:
//!
//! | Stream          | Shape              | Values                                  |
//! |-----------------|--------------------|-----------------------------------------|
//! | range2d         | `[rows, cols]`     | range 0..200 m mapped to -1..1          |
//! | reflectivity2d  | `[rows, cols]`     | 0..255 mapped to 0..1, 8x contrast      |
//! | points3d        | `[rows * cols, 3]` | `[x, z, -y]` in meters                  |
//! | reflectivity3d  | `[rows * cols, 3]` | `[r, 0, 1]` colors                      |
//! | combined2d      | `[rows * cols * 4]`| interleaved clip-space `[x, y, z, r]`   |

use crate::types::{Frame, Shape, StreamType};
use crate::{Result, StreamError};

/// Upper end of the sensor range in millimeters.
pub const MAX_RANGE_MM: f32 = 200_000.0;

/// Upper end of raw reflectivity.
pub const MAX_REFLECTIVITY: f32 = 255.0;

/// Contrast boost applied to normalized reflectivity.
pub const REFLECTIVITY_CONTRAST: f32 = 8.0;

/// Largest scan grid. A combined2d frame carries four values per cell and
/// its length must fit the u32 shape field.
pub const MAX_SCAN_CELLS: u32 = u32::MAX / 4;

/// Check that a `rows x cols` grid is non-empty and within
/// [`MAX_SCAN_CELLS`]. Returns the cell count.
pub fn check_grid(rows: u32, cols: u32) -> Result<u32> {
    let cells = u64::from(rows) * u64::from(cols);
    if cells == 0 || cells > u64::from(MAX_SCAN_CELLS) {
        return Err(StreamError::config(format!(
            "scan grid {rows}x{cols} must hold between 1 and {MAX_SCAN_CELLS} cells"
        )));
    }
    Ok(cells as u32)
}

/// One full sensor rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    rows: u32,
    cols: u32,
    /// Range per cell in millimeters, row-major
    range_mm: Vec<u32>,
    /// Raw reflectivity per cell, row-major
    reflectivity: Vec<u8>,
    /// Cartesian position per cell in meters, row-major
    xyz: Vec<[f32; 3]>,
}

impl Scan {
    /// Build a scan, checking every grid against `rows * cols`.
    pub fn new(
        rows: u32,
        cols: u32,
        range_mm: Vec<u32>,
        reflectivity: Vec<u8>,
        xyz: Vec<[f32; 3]>,
    ) -> Result<Self> {
        let expected = check_grid(rows, cols)? as usize;
        for actual in [range_mm.len(), reflectivity.len(), xyz.len()] {
            if actual != expected {
                return Err(StreamError::PayloadShapeInconsistency { rows, cols, expected, actual });
            }
        }
        Ok(Self { rows, cols, range_mm, reflectivity, xyz })
    }

    /// Build a scan from grids the caller sized as `rows * cols`.
    pub(crate) fn from_grids(
        rows: u32,
        cols: u32,
        range_mm: Vec<u32>,
        reflectivity: Vec<u8>,
        xyz: Vec<[f32; 3]>,
    ) -> Self {
        debug_assert_eq!(range_mm.len(), rows as usize * cols as usize);
        debug_assert_eq!(reflectivity.len(), range_mm.len());
        debug_assert_eq!(xyz.len(), range_mm.len());
        Self { rows, cols, range_mm, reflectivity, xyz }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of cells (points) in the scan.
    pub fn len(&self) -> usize {
        self.range_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range_mm.is_empty()
    }

    pub fn range_mm(&self) -> &[u32] {
        &self.range_mm
    }

    pub fn reflectivity(&self) -> &[u8] {
        &self.reflectivity
    }

    pub fn xyz(&self) -> &[[f32; 3]] {
        &self.xyz
    }

    /// Render this scan as a frame of the given stream type.
    pub fn to_frame(&self, stream_type: StreamType, frame_number: u32) -> Result<Frame> {
        let points = check_grid(self.rows, self.cols)?;
        let (shape, payload) = match stream_type {
            StreamType::Range2d => (Shape::new(self.rows, self.cols), self.range_values().collect()),
            StreamType::Reflectivity2d => {
                (Shape::new(self.rows, self.cols), self.reflectivity_values().collect())
            }
            StreamType::Points3d => (Shape::new(points, 3), self.points_webgl()),
            StreamType::Reflectivity3d => (Shape::new(points, 3), self.reflectivity_colors()),
            StreamType::Combined2d => (Shape::flat(points * 4), self.combined()),
        };
        Frame::from_payload(stream_type, frame_number, shape, payload)
    }

    fn range_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.range_mm.iter().map(|mm| normalize(*mm as f32, 0.0, MAX_RANGE_MM, -1.0, 1.0, 1.0))
    }

    fn reflectivity_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.reflectivity.iter().map(|r| {
            normalize(*r as f32, 0.0, MAX_REFLECTIVITY, 0.0, 1.0, REFLECTIVITY_CONTRAST)
        })
    }

    fn points_webgl(&self) -> Vec<f32> {
        self.xyz.iter().flat_map(|[x, y, z]| [*x, *z, -*y]).collect()
    }

    fn reflectivity_colors(&self) -> Vec<f32> {
        self.reflectivity_values().flat_map(|r| [r, 0.0, 1.0]).collect()
    }

    fn combined(&self) -> Vec<f32> {
        let xs: Vec<f32> = linspace(-1.0, 1.0, self.cols as usize).collect();
        let ys = linspace(1.0, -1.0, self.rows as usize);
        let mut depth = self.range_values().zip(self.reflectivity_values());

        let mut out = Vec::with_capacity(self.len() * 4);
        for y in ys {
            for x in &xs {
                if let Some((z, r)) = depth.next() {
                    out.extend_from_slice(&[*x, y, z, r]);
                }
            }
        }
        out
    }
}

/// Linear map from the source range to the target range, scaled by
/// `contrast` and capped at 1.
pub fn normalize(
    value: f32,
    source_min: f32,
    source_max: f32,
    target_min: f32,
    target_max: f32,
    contrast: f32,
) -> f32 {
    let mapped =
        target_min + (value - source_min) * (target_max - target_min) / (source_max - source_min);
    (mapped * contrast).min(1.0)
}

/// `n` evenly spaced values from `start` to `end` inclusive.
/// A single value is `start`.
pub fn linspace(start: f32, end: f32, n: usize) -> impl Iterator<Item = f32> {
    let step = if n > 1 { (end - start) / (n - 1) as f32 } else { 0.0 };
    (0..n).map(move |i| if i + 1 == n && n > 1 { end } else { start + step * i as f32 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_scan() -> Scan {
        // 2 rows x 3 cols
        Scan::new(
            2,
            3,
            vec![0, 100_000, 200_000, 50_000, 150_000, 300_000],
            vec![0, 16, 32, 64, 128, 255],
            vec![
                [1.0, 2.0, 3.0],
                [4.0, 5.0, 6.0],
                [7.0, 8.0, 9.0],
                [-1.0, -2.0, -3.0],
                [0.0, 0.0, 0.0],
                [0.5, 0.25, 0.125],
            ],
        )
        .unwrap()
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        let err = Scan::new(2, 2, vec![0; 4], vec![0; 3], vec![[0.0; 3]; 4]).unwrap_err();
        assert!(matches!(err, StreamError::PayloadShapeInconsistency { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn grids_beyond_the_frame_shape_limit_are_rejected() {
        assert_eq!(check_grid(128, 1024).unwrap(), 131_072);
        assert_eq!(check_grid(1, MAX_SCAN_CELLS).unwrap(), MAX_SCAN_CELLS);
        assert!(matches!(check_grid(1, MAX_SCAN_CELLS + 1), Err(StreamError::Config { .. })));
        assert!(matches!(check_grid(65_536, 65_536), Err(StreamError::Config { .. })));
        assert!(matches!(check_grid(0, 16), Err(StreamError::Config { .. })));

        let err = Scan::new(u32::MAX, 2, vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, StreamError::Config { .. }));
    }

    #[test]
    fn range_maps_to_clip_space() {
        let frame = grid_scan().to_frame(StreamType::Range2d, 0).unwrap();
        assert_eq!(frame.dims(), vec![2, 3]);
        assert_eq!(frame.payload[0], -1.0);
        assert_eq!(frame.payload[1], 0.0);
        assert_eq!(frame.payload[2], 1.0);
        // Beyond the sensor range is capped
        assert_eq!(frame.payload[5], 1.0);
        assert_eq!((frame.min_val, frame.max_val), (-1.0, 1.0));
    }

    #[test]
    fn reflectivity_gets_contrast_boost() {
        let frame = grid_scan().to_frame(StreamType::Reflectivity2d, 0).unwrap();
        assert_eq!(frame.payload[0], 0.0);
        assert!((frame.payload[1] - 16.0 / 255.0 * 8.0).abs() < 1e-6);
        assert_eq!(frame.payload[3], 1.0);
        assert_eq!(frame.payload[5], 1.0);
    }

    #[test]
    fn points_use_webgl_axis_order() {
        let frame = grid_scan().to_frame(StreamType::Points3d, 0).unwrap();
        assert_eq!(frame.dims(), vec![6, 3]);
        assert_eq!(&frame.payload[0..3], &[1.0, 3.0, -2.0]);
        assert_eq!(&frame.payload[9..12], &[-1.0, -3.0, 2.0]);
    }

    #[test]
    fn reflectivity_colors_are_red_blue() {
        let frame = grid_scan().to_frame(StreamType::Reflectivity3d, 0).unwrap();
        assert_eq!(frame.dims(), vec![6, 3]);
        for row in frame.rows() {
            assert_eq!(row[1], 0.0);
            assert_eq!(row[2], 1.0);
        }
    }

    #[test]
    fn combined_layout_is_xyzr_over_grid() {
        let frame = grid_scan().to_frame(StreamType::Combined2d, 3).unwrap();
        assert_eq!(frame.dims(), vec![24]);

        let points: Vec<&[f32]> = frame.payload.chunks(4).collect();
        // First row sits at y = 1, columns sweep x from -1 to 1
        assert_eq!(points[0][..2], [-1.0, 1.0]);
        assert_eq!(points[1][..2], [0.0, 1.0]);
        assert_eq!(points[2][..2], [1.0, 1.0]);
        // Last row sits at y = -1
        assert_eq!(points[3][..2], [-1.0, -1.0]);
        assert_eq!(points[5][..2], [1.0, -1.0]);
        // z is normalized range, r normalized reflectivity
        assert_eq!(points[1][2], 0.0);
        assert_eq!(points[5][3], 1.0);
    }

    #[test]
    fn linspace_endpoints() {
        assert_eq!(linspace(-1.0, 1.0, 5).collect::<Vec<_>>(), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(1.0, -1.0, 1).collect::<Vec<_>>(), vec![1.0]);
        assert_eq!(linspace(0.0, 1.0, 0).count(), 0);
    }
}
