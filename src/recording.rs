//! Scan recording files.
//!
//! A recording is a small header followed by length-prefixed scan records,
//! all little-endian:
//!
//! ```text
//! "PSRC" | version u32 | tick rate f32 | rows u32 | cols u32
//! record: len u32 | range u32 * n | reflectivity u8 * n | xyz f32 * 3n
//! ```
//!
//! where `n = rows * cols`.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, info};

use crate::scan::{Scan, check_grid};
use crate::{Result, StreamError};

pub const RECORDING_MAGIC: [u8; 4] = *b"PSRC";
pub const RECORDING_VERSION: u32 = 1;

/// Tick rates a recording may declare, in Hz.
pub const MIN_TICK_RATE: f32 = 0.01;
pub const MAX_TICK_RATE: f32 = 10_000.0;

/// Length of the file header in bytes.
pub const RECORDING_HEADER_LEN: usize = 20;

/// Bytes stored per scan cell.
const CELL_LEN: usize = 4 + 1 + 12;

/// Fixed metadata at the start of a recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingHeader {
    pub version: u32,
    pub tick_rate: f32,
    pub rows: u32,
    pub cols: u32,
}

impl RecordingHeader {
    pub fn new(tick_rate: f32, rows: u32, cols: u32) -> Self {
        Self { version: RECORDING_VERSION, tick_rate, rows, cols }
    }

    fn cells(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Size of one scan record body.
    pub fn record_len(&self) -> usize {
        self.cells() * CELL_LEN
    }

    fn write_to(&self, out: &mut BytesMut) {
        out.put_slice(&RECORDING_MAGIC);
        out.put_u32_le(self.version);
        out.put_f32_le(self.tick_rate);
        out.put_u32_le(self.rows);
        out.put_u32_le(self.cols);
    }

    fn parse(bytes: &[u8; RECORDING_HEADER_LEN]) -> Result<Self> {
        if bytes[..4] != RECORDING_MAGIC {
            return Err(StreamError::recording(format!(
                "not a scan recording (magic {:?})",
                &bytes[..4]
            )));
        }
        let mut buf = &bytes[4..];
        let header = Self {
            version: buf.get_u32_le(),
            tick_rate: buf.get_f32_le(),
            rows: buf.get_u32_le(),
            cols: buf.get_u32_le(),
        };
        if header.version != RECORDING_VERSION {
            return Err(StreamError::recording(format!(
                "unsupported recording version {}",
                header.version
            )));
        }
        header.validate()?;
        Ok(header)
    }

    /// Check the tick rate and that a record length fits its u32 prefix.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TICK_RATE..=MAX_TICK_RATE).contains(&self.tick_rate) {
            return Err(StreamError::recording(format!(
                "tick rate {} outside {}..={} Hz",
                self.tick_rate, MIN_TICK_RATE, MAX_TICK_RATE
            )));
        }
        check_grid(self.rows, self.cols)
            .map_err(|e| StreamError::recording(e.to_string()))?;
        if u32::try_from(self.record_len()).is_err() {
            return Err(StreamError::recording(format!(
                "{}x{} scans need {} bytes per record, more than a record can hold",
                self.rows,
                self.cols,
                self.record_len()
            )));
        }
        Ok(())
    }
}

/// Appends scans to a recording file.
pub struct RecordingWriter {
    path: PathBuf,
    header: RecordingHeader,
    out: BufWriter<File>,
    scans: u64,
}

impl RecordingWriter {
    /// Create (or truncate) a recording and write its header.
    pub fn create(path: impl AsRef<Path>, header: RecordingHeader) -> Result<Self> {
        header.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| StreamError::io_error(&path, e))?;
        let mut out = BufWriter::new(file);

        let mut bytes = BytesMut::with_capacity(RECORDING_HEADER_LEN);
        header.write_to(&mut bytes);
        out.write_all(&bytes).map_err(|e| StreamError::io_error(&path, e))?;

        debug!(
            "Created recording {} ({}x{} at {}Hz)",
            path.display(),
            header.rows,
            header.cols,
            header.tick_rate
        );
        Ok(Self { path, header, out, scans: 0 })
    }

    pub fn write_scan(&mut self, scan: &Scan) -> Result<()> {
        if scan.rows() != self.header.rows || scan.cols() != self.header.cols {
            return Err(StreamError::recording(format!(
                "scan is {}x{}, recording is {}x{}",
                scan.rows(),
                scan.cols(),
                self.header.rows,
                self.header.cols
            )));
        }

        let record_len = self.header.record_len();
        let prefix = u32::try_from(record_len)
            .map_err(|_| StreamError::recording(format!("record of {record_len} bytes")))?;
        let mut bytes = BytesMut::with_capacity(4 + record_len);
        bytes.put_u32_le(prefix);
        for range in scan.range_mm() {
            bytes.put_u32_le(*range);
        }
        bytes.put_slice(scan.reflectivity());
        for [x, y, z] in scan.xyz() {
            bytes.put_f32_le(*x);
            bytes.put_f32_le(*y);
            bytes.put_f32_le(*z);
        }

        self.out.write_all(&bytes).map_err(|e| StreamError::io_error(&self.path, e))?;
        self.scans += 1;
        Ok(())
    }

    /// Flush buffered data. Returns the number of scans written.
    pub fn finish(mut self) -> Result<u64> {
        self.out.flush().map_err(|e| StreamError::io_error(&self.path, e))?;
        info!("Wrote {} scans to {}", self.scans, self.path.display());
        Ok(self.scans)
    }
}

/// Reads scans back from a recording file.
pub struct RecordingReader {
    path: PathBuf,
    header: RecordingHeader,
    input: BufReader<File>,
    scans_read: u64,
}

impl RecordingReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| StreamError::io_error(&path, e))?;
        let mut input = BufReader::new(file);

        let mut bytes = [0u8; RECORDING_HEADER_LEN];
        input.read_exact(&mut bytes).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => StreamError::recording("file shorter than its header"),
            _ => StreamError::io_error(&path, e),
        })?;
        let header = RecordingHeader::parse(&bytes)?;

        Ok(Self { path, header, input, scans_read: 0 })
    }

    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn scans_read(&self) -> u64 {
        self.scans_read
    }

    /// Read the next scan, `None` at a clean end of file.
    pub fn read_scan(&mut self) -> Result<Option<Scan>> {
        let mut len_bytes = [0u8; 4];
        match self.input.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(StreamError::io_error(&self.path, e)),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        let expected = self.header.record_len();
        if len != expected {
            return Err(StreamError::recording(format!(
                "scan {} has {} bytes, expected {}",
                self.scans_read, len, expected
            )));
        }

        let mut body = vec![0u8; len];
        self.input.read_exact(&mut body).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                StreamError::recording(format!("scan {} is truncated", self.scans_read))
            }
            _ => StreamError::io_error(&self.path, e),
        })?;

        let cells = self.header.cells();
        let mut buf = body.as_slice();
        let range_mm = (0..cells).map(|_| buf.get_u32_le()).collect();
        let reflectivity = buf[..cells].to_vec();
        buf.advance(cells);
        let xyz = (0..cells).map(|_| [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()]).collect();

        self.scans_read += 1;
        Scan::new(self.header.rows, self.header.cols, range_mm, reflectivity, xyz).map(Some)
    }
}

impl Iterator for RecordingReader {
    type Item = Result<Scan>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_scan().transpose()
    }
}
