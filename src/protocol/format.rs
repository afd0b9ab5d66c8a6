//! Wire header layouts
//!
//! Every message starts with a fixed 32-byte header made of a 4-byte ASCII
//! magic followed by seven little-endian 4-byte fields.
//!
//! ```text
//! offset  Standard "LIDR"   Chunk "CHUN"     EndOfFrame "EOFR"
//!  0      magic             magic            magic
//!  4      stream type id    stream type id   stream type id
//!  8      frame number      frame number     frame number
//! 12      shape0            chunk index      payload byte size
//! 16      shape1            total chunks     total chunks
//! 20      min (f32)         start (f32)      reserved
//! 24      max (f32)         end (f32)        reserved
//! 28      reserved = 0      chunk len        reserved
//! 32..    f32 payload       chunk bytes      original Standard header
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::types::{Shape, StreamType};
use crate::{Result, StreamError};

/// Size of every message header in bytes.
pub const HEADER_LEN: usize = 32;

pub const STANDARD_MAGIC: [u8; 4] = *b"LIDR";
pub const CHUNK_MAGIC: [u8; 4] = *b"CHUN";
pub const END_OF_FRAME_MAGIC: [u8; 4] = *b"EOFR";

/// Full length of an EndOfFrame message: its header plus the original header.
pub const END_OF_FRAME_LEN: usize = HEADER_LEN * 2;

/// Header of a `Standard` message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardHeader {
    pub stream_type: StreamType,
    pub frame_number: u32,
    pub shape: Shape,
    pub min_val: f32,
    pub max_val: f32,
    pub reserved: u32,
}

/// Header of a `Chunk` message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkHeader {
    pub stream_type: StreamType,
    pub frame_number: u32,
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Informational byte offset of the slice start within the payload
    pub start_offset: f32,
    /// Informational byte offset of the slice end within the payload
    pub end_offset: f32,
    /// Number of chunk bytes following the header
    pub chunk_len: u32,
}

/// Header of an `EndOfFrame` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfFrameHeader {
    pub stream_type: StreamType,
    pub frame_number: u32,
    /// Total payload bytes across all chunks
    pub data_size: u32,
    pub total_chunks: u32,
}

/// Read the magic of a message, rejecting anything shorter than a header.
pub fn read_magic(wire: &[u8]) -> Result<[u8; 4]> {
    if wire.len() < HEADER_LEN {
        return Err(StreamError::Truncated { len: wire.len() });
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&wire[..4]);
    Ok(magic)
}

/// Fields after the magic, as a cursor over the 28 remaining header bytes.
fn header_fields(wire: &[u8], expected_magic: [u8; 4]) -> Result<&[u8]> {
    let magic = read_magic(wire)?;
    if magic != expected_magic {
        return Err(StreamError::InvalidMagic { magic });
    }
    Ok(&wire[4..HEADER_LEN])
}

impl StandardHeader {
    pub fn parse(wire: &[u8]) -> Result<Self> {
        let mut buf = header_fields(wire, STANDARD_MAGIC)?;
        let stream_type = StreamType::from_id(buf.get_u32_le())?;
        let frame_number = buf.get_u32_le();
        let rows = buf.get_u32_le();
        let cols = buf.get_u32_le();
        let min_val = buf.get_f32_le();
        let max_val = buf.get_f32_le();
        let reserved = buf.get_u32_le();

        Ok(Self {
            stream_type,
            frame_number,
            shape: Shape::new(rows, cols),
            min_val,
            max_val,
            reserved,
        })
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        out.put_slice(&STANDARD_MAGIC);
        out.put_u32_le(self.stream_type.id());
        out.put_u32_le(self.frame_number);
        out.put_u32_le(self.shape.rows);
        out.put_u32_le(self.shape.cols);
        out.put_f32_le(self.min_val);
        out.put_f32_le(self.max_val);
        out.put_u32_le(self.reserved);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = BytesMut::with_capacity(HEADER_LEN);
        self.write_to(&mut out);
        let mut bytes = [0u8; HEADER_LEN];
        bytes.copy_from_slice(&out);
        bytes
    }

    /// Total length of a Standard message carrying this header, or `None`
    /// for a shape too large to address.
    pub fn message_len(&self) -> Option<usize> {
        self.shape.checked_byte_len()?.checked_add(HEADER_LEN)
    }
}

impl ChunkHeader {
    pub fn parse(wire: &[u8]) -> Result<Self> {
        let mut buf = header_fields(wire, CHUNK_MAGIC)?;
        Ok(Self {
            stream_type: StreamType::from_id(buf.get_u32_le())?,
            frame_number: buf.get_u32_le(),
            chunk_index: buf.get_u32_le(),
            total_chunks: buf.get_u32_le(),
            start_offset: buf.get_f32_le(),
            end_offset: buf.get_f32_le(),
            chunk_len: buf.get_u32_le(),
        })
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        out.put_slice(&CHUNK_MAGIC);
        out.put_u32_le(self.stream_type.id());
        out.put_u32_le(self.frame_number);
        out.put_u32_le(self.chunk_index);
        out.put_u32_le(self.total_chunks);
        out.put_f32_le(self.start_offset);
        out.put_f32_le(self.end_offset);
        out.put_u32_le(self.chunk_len);
    }
}

impl EndOfFrameHeader {
    pub fn parse(wire: &[u8]) -> Result<Self> {
        let mut buf = header_fields(wire, END_OF_FRAME_MAGIC)?;
        Ok(Self {
            stream_type: StreamType::from_id(buf.get_u32_le())?,
            frame_number: buf.get_u32_le(),
            data_size: buf.get_u32_le(),
            total_chunks: buf.get_u32_le(),
        })
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        out.put_slice(&END_OF_FRAME_MAGIC);
        out.put_u32_le(self.stream_type.id());
        out.put_u32_le(self.frame_number);
        out.put_u32_le(self.data_size);
        out.put_u32_le(self.total_chunks);
        out.put_bytes(0, 12);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_standard() -> StandardHeader {
        StandardHeader {
            stream_type: StreamType::Points3d,
            frame_number: 7,
            shape: Shape::new(4, 3),
            min_val: 1.0,
            max_val: 12.0,
            reserved: 0,
        }
    }

    #[test]
    fn standard_header_layout_is_little_endian() {
        let bytes = sample_standard().to_bytes();
        assert_eq!(&bytes[0..4], b"LIDR");
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &7u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &4u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &3u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[24..28], &12.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);
    }

    #[test]
    fn standard_header_parses_back() {
        let header = sample_standard();
        assert_eq!(StandardHeader::parse(&header.to_bytes()).unwrap(), header);
        assert_eq!(header.message_len(), Some(80));
    }

    #[test]
    fn chunk_header_fields_land_at_fixed_offsets() {
        let header = ChunkHeader {
            stream_type: StreamType::Range2d,
            frame_number: 3,
            chunk_index: 1,
            total_chunks: 4,
            start_offset: 1024.0,
            end_offset: 2048.0,
            chunk_len: 1024,
        };
        let mut out = BytesMut::new();
        header.write_to(&mut out);
        assert_eq!(out.len(), HEADER_LEN);
        assert_eq!(&out[0..4], b"CHUN");
        assert_eq!(&out[12..16], &1u32.to_le_bytes());
        assert_eq!(&out[16..20], &4u32.to_le_bytes());
        assert_eq!(&out[28..32], &1024u32.to_le_bytes());
        assert_eq!(ChunkHeader::parse(&out).unwrap(), header);
    }

    #[test]
    fn end_of_frame_header_zeroes_reserved_bytes() {
        let header = EndOfFrameHeader {
            stream_type: StreamType::Combined2d,
            frame_number: 9,
            data_size: 4096,
            total_chunks: 2,
        };
        let mut out = BytesMut::new();
        header.write_to(&mut out);
        assert_eq!(out.len(), HEADER_LEN);
        assert!(out[20..32].iter().all(|b| *b == 0));
        assert_eq!(EndOfFrameHeader::parse(&out).unwrap(), header);
    }

    #[test]
    fn wrong_magic_is_reported() {
        let mut bytes = sample_standard().to_bytes();
        bytes[0..4].copy_from_slice(b"BAD!");
        match StandardHeader::parse(&bytes) {
            Err(StreamError::InvalidMagic { magic }) => assert_eq!(&magic, b"BAD!"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_stream_id_is_reported() {
        let mut bytes = sample_standard().to_bytes();
        bytes[4..8].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(
            StandardHeader::parse(&bytes),
            Err(StreamError::UnknownStreamType { id: 5 })
        ));
    }

    #[test]
    fn short_input_is_truncated() {
        assert!(matches!(read_magic(&[0u8; 31]), Err(StreamError::Truncated { len: 31 })));
    }
}
