//! Server and client talking over a real socket.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use pointstream::protocol::ChunkingConfig;
use pointstream::providers::{SyntheticProvider, synthetic_scan};
use pointstream::types::{StreamType, UpdateRate};
use pointstream::{ClientConfig, StreamClient, StreamServer};

const ROWS: u32 = 16;
const COLS: u32 = 64;

/// A points3d frame of 16x64 points is 12 KiB, so these limits force chunking.
const SMALL_CHUNKS: ChunkingConfig = ChunkingConfig { max_message_size: 4096, chunk_size: 2048 };

async fn start_server(limit: Option<u64>) -> (SocketAddr, CancellationToken) {
    let _ = tracing_subscriber::fmt::try_init();

    let mut provider = SyntheticProvider::new(ROWS, COLS, 50).unwrap();
    if let Some(limit) = limit {
        provider = provider.with_limit(limit);
    }

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = StreamServer::bind(addr, SMALL_CHUNKS, provider).await.unwrap();
    let local = server.local_addr().unwrap();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.run());
    (local, shutdown)
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nOrigin: http://localhost:5173\r\nConnection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn chunked_frames_arrive_intact() {
    let (addr, shutdown) = start_server(None).await;
    let client = StreamClient::connect(
        &format!("ws://{addr}"),
        StreamType::Points3d,
        ClientConfig::default(),
    )
    .await
    .unwrap();

    let stats = client.stats_receiver();
    let mut frames = client.subscribe(UpdateRate::Native);
    let mut numbers = Vec::new();
    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
            .await
            .expect("frame within timeout")
            .expect("stream still open");

        assert_eq!(frame.stream_type, StreamType::Points3d);
        assert_eq!(frame.dims(), vec![ROWS * COLS, 3]);

        // Latest-wins delivery means any scan index may have been rendered.
        let matches_a_scan = (0..500).any(|index| {
            synthetic_scan(ROWS, COLS, index)
                .to_frame(StreamType::Points3d, frame.frame_number)
                .is_ok_and(|expected| expected == frame)
        });
        assert!(matches_a_scan, "frame {} was corrupted in transit", frame.frame_number);
        numbers.push(frame.frame_number);
    }

    assert_eq!(numbers, vec![0, 1, 2]);
    assert!(stats.borrow().frames_completed >= 3);
    shutdown.cancel();
}

#[tokio::test]
async fn client_stats_count_chunks() {
    let (addr, shutdown) = start_server(None).await;
    let mut client = StreamClient::connect(
        &format!("ws://{addr}"),
        StreamType::Combined2d,
        ClientConfig::default(),
    )
    .await
    .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("frame within timeout")
        .expect("stream still open")
        .expect("frame decodes");
    assert_eq!(frame.dims(), vec![ROWS * COLS * 4]);

    let stats = client.stats();
    assert!(stats.frames_completed >= 1);
    // 16 KiB payload in 2 KiB chunks
    assert!(stats.chunks_received >= 8);
    assert_eq!(stats.standard_frames, 0);

    shutdown.cancel();
}

#[tokio::test]
async fn stream_ends_when_source_ends() {
    let (addr, shutdown) = start_server(Some(25)).await;
    let client = StreamClient::connect(
        &format!("ws://{addr}"),
        StreamType::Range2d,
        ClientConfig::default(),
    )
    .await
    .unwrap();

    let frames: Vec<_> = tokio::time::timeout(Duration::from_secs(5), client.collect::<Vec<_>>())
        .await
        .expect("stream ends within timeout");
    // 25 scans at 50Hz outlast the handshake, so at least one frame arrives
    assert!((1..=25).contains(&frames.len()), "got {} frames", frames.len());
    assert!(frames.iter().all(|f| f.is_ok()));

    shutdown.cancel();
}

#[tokio::test]
async fn unknown_stream_is_not_found() {
    let (addr, shutdown) = start_server(None).await;

    let response = http_get(addr, "/ws/thermal").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    assert!(response.contains(r#""type":"error""#), "{response}");
    assert!(response.contains("thermal"), "{response}");

    shutdown.cancel();
}

#[tokio::test]
async fn health_and_info_allow_any_origin() {
    let (addr, shutdown) = start_server(None).await;

    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"), "{health}");
    assert!(health.contains(r#"{"status":"healthy"}"#), "{health}");
    assert!(health.to_ascii_lowercase().contains("access-control-allow-origin: *"), "{health}");

    let info = http_get(addr, "/").await;
    assert!(info.contains(r#""max_message_size":4096"#), "{info}");
    assert!(info.contains(r#""chunk_size":2048"#), "{info}");
    assert!(info.contains(r#""points3d":"/ws/points3d""#), "{info}");
    assert!(info.to_ascii_lowercase().contains("access-control-allow-origin: *"), "{info}");

    shutdown.cancel();
}
