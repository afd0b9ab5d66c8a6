//! End-to-end chunking tests over full-size sensor scans.

use std::sync::{Arc, Mutex};

use pointstream::protocol::{
    ChunkingConfig, FrameEncoder, HEADER_LEN, Reassembler, WireMessage, decode_standard,
};
use pointstream::providers::synthetic_scan;
use pointstream::types::{Frame, Shape, StreamType};
use pointstream::{FrameReceiver, StreamError};

fn full_frame(stream_type: StreamType, frame_number: u32) -> Frame {
    synthetic_scan(128, 1024, frame_number as u64)
        .to_frame(stream_type, frame_number)
        .expect("synthetic scans are consistent")
}

#[test]
fn reference_points_frame_is_a_single_standard_message() {
    let payload: Vec<f32> = (1..=12).map(|v| v as f32).collect();
    let frame = Frame::from_payload(StreamType::Points3d, 7, Shape::new(4, 3), payload).unwrap();

    let messages = FrameEncoder::default().encode(&frame).unwrap();
    assert_eq!(messages.len(), 1);

    let wire = &messages[0];
    assert_eq!(wire.len(), 80);
    assert_eq!(&wire[..4], b"LIDR");
    assert_eq!(u32::from_le_bytes(wire[4..8].try_into().unwrap()), 2);
    assert_eq!(u32::from_le_bytes(wire[8..12].try_into().unwrap()), 7);
    assert_eq!(u32::from_le_bytes(wire[12..16].try_into().unwrap()), 4);
    assert_eq!(u32::from_le_bytes(wire[16..20].try_into().unwrap()), 3);
    assert_eq!(f32::from_le_bytes(wire[20..24].try_into().unwrap()), 1.0);
    assert_eq!(f32::from_le_bytes(wire[24..28].try_into().unwrap()), 12.0);
    assert_eq!(&wire[28..32], &[0, 0, 0, 0]);

    assert_eq!(decode_standard(wire).unwrap(), frame);
}

#[test]
fn every_full_scan_stream_survives_chunking() {
    let encoder = FrameEncoder::default();
    let mut reassembler = Reassembler::default();

    for (n, stream_type) in StreamType::ALL.into_iter().enumerate() {
        let frame = full_frame(stream_type, n as u32);
        let messages = encoder.encode(&frame).unwrap();
        assert!(messages.len() > 1, "{stream_type} should need chunking");
        assert!(messages.iter().all(|m| m.len() <= encoder.config().max_message_size));

        let mut completed = None;
        for message in &messages {
            if let Some(frame) = reassembler.push(message).unwrap() {
                completed = Some(frame);
            }
        }
        assert_eq!(completed.as_ref(), Some(&frame));
    }

    let stats = reassembler.stats();
    assert_eq!(stats.frames_completed, 5);
    assert_eq!(stats.dropped_incomplete, 0);
    assert_eq!(reassembler.pending(), 0);
}

#[test]
fn reversed_and_interleaved_frames_reassemble() {
    let encoder = FrameEncoder::default();
    let first = full_frame(StreamType::Points3d, 10);
    let second = full_frame(StreamType::Points3d, 11);

    let mut a = encoder.encode(&first).unwrap();
    let mut b = encoder.encode(&second).unwrap();
    let end_a = a.pop().unwrap();
    let end_b = b.pop().unwrap();

    let mut reassembler = Reassembler::default();
    for (x, y) in a.iter().rev().zip(b.iter()) {
        assert!(reassembler.push(x).unwrap().is_none());
        assert!(reassembler.push(y).unwrap().is_none());
    }
    assert_eq!(reassembler.pending(), 2);

    assert_eq!(reassembler.push(&end_b).unwrap(), Some(second));
    assert_eq!(reassembler.push(&end_a).unwrap(), Some(first));
    assert_eq!(reassembler.pending(), 0);
}

#[test]
fn chunk_size_bounds_each_chunk_message() {
    let config = ChunkingConfig { max_message_size: 64 * 1024, chunk_size: 16 * 1024 };
    let encoder = FrameEncoder::new(config).unwrap();
    let frame = full_frame(StreamType::Range2d, 0);
    let messages = encoder.encode(&frame).unwrap();

    // 512 KiB payload in 16 KiB chunks, plus the end-of-frame marker
    assert_eq!(messages.len(), 33);
    for message in &messages[..32] {
        match WireMessage::parse(message).unwrap() {
            WireMessage::Chunk { header, data } => {
                assert_eq!(header.total_chunks, 32);
                assert_eq!(data.len(), 16 * 1024);
                assert_eq!(message.len(), HEADER_LEN + 16 * 1024);
            }
            other => panic!("expected chunk, got {}", other.kind()),
        }
    }
}

#[test]
fn receiver_drops_a_frame_with_a_lost_chunk_and_keeps_going() {
    let encoder = FrameEncoder::default();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut receiver = FrameReceiver::default();
    let sink = Arc::clone(&seen);
    receiver.on_frame(StreamType::Reflectivity3d, move |frame| {
        sink.lock().unwrap().push(frame.frame_number);
    });

    let lossy = encoder.encode(&full_frame(StreamType::Reflectivity3d, 1)).unwrap();
    for (i, message) in lossy.iter().enumerate() {
        if i == 2 {
            continue;
        }
        assert!(receiver.receive(message).unwrap().is_none());
    }

    for message in encoder.encode(&full_frame(StreamType::Reflectivity3d, 2)).unwrap() {
        assert!(receiver.receive(&message).unwrap().is_none());
    }

    assert_eq!(*seen.lock().unwrap(), vec![2]);
    assert_eq!(receiver.stats().dropped_incomplete, 1);
    assert_eq!(receiver.pending(), 0);
}

#[test]
fn garbage_is_rejected_without_losing_state() {
    let mut reassembler = Reassembler::default();
    let messages = FrameEncoder::default().encode(&full_frame(StreamType::Combined2d, 3)).unwrap();
    let (end, chunks) = messages.split_last().unwrap();

    for chunk in chunks {
        reassembler.push(chunk).unwrap();
    }
    assert!(matches!(
        reassembler.push(b"XXXXgarbage-that-is-long-enough-for-a-header"),
        Err(StreamError::InvalidMagic { .. })
    ));
    assert!(matches!(reassembler.push(b"short"), Err(StreamError::Truncated { len: 5 })));

    assert!(reassembler.push(end).unwrap().is_some());
}
