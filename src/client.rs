//! WebSocket frame client
//!
//! A [`StreamClient`] owns one connection and one [`FrameReceiver`]. A
//! background task reads messages, reassembles frames and periodically
//! expires stale buffers. Decoded frames (and per-frame errors) are exposed
//! as a [`Stream`].
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use pointstream::client::{ClientConfig, StreamClient};
//! use pointstream::types::{StreamType, UpdateRate};
//!
//! # async fn run() -> pointstream::Result<()> {
//! let client =
//!     StreamClient::connect("ws://127.0.0.1:8000", StreamType::Points3d, ClientConfig::default())
//!         .await?;
//!
//! let mut frames = client.subscribe(UpdateRate::Max(2));
//! while let Some(frame) = frames.next().await {
//!     println!("frame {} with {} points", frame.frame_number, frame.shape.rows);
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_FPS;
use crate::protocol::{ReassemblyConfig, ReassemblyStats};
use crate::receiver::FrameReceiver;
use crate::stream::ThrottleExt;
use crate::types::{Frame, StreamType, UpdateRate};
use crate::{Result, StreamError};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Client-side settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    pub reassembly: ReassemblyConfig,
    /// How often stale reassembly buffers are expired
    pub expire_interval: Duration,
    /// Decoded frames buffered ahead of the consumer
    pub buffer: usize,
    /// Frame rate of the server, used to normalize throttling
    pub source_hz: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reassembly: ReassemblyConfig::default(),
            expire_interval: Duration::from_secs(1),
            buffer: 16,
            source_hz: DEFAULT_FPS as f64,
        }
    }
}

/// Connection to one stream endpoint.
///
/// Yields `Ok(frame)` for each decoded frame, `Err` for messages or frames
/// that could not be decoded, and ends when the connection closes. Dropping
/// the client closes the connection and discards partial frames.
pub struct StreamClient {
    stream_type: StreamType,
    frames: ReceiverStream<Result<Frame>>,
    stats: watch::Receiver<ReassemblyStats>,
    source_hz: f64,
    cancel: CancellationToken,
}

#[derive(Deserialize)]
struct RemoteError {
    error: String,
}

impl StreamClient {
    /// Connect to `{base_url}/ws/{stream_type}`.
    pub async fn connect(
        base_url: &str,
        stream_type: StreamType,
        config: ClientConfig,
    ) -> Result<Self> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), stream_type.endpoint());
        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::transport_with_source(format!("connect to {url}"), e))?;
        info!("Connected to {}", url);

        let (frame_tx, frame_rx) = mpsc::channel(config.buffer.max(1));
        let (stats_tx, stats_rx) = watch::channel(ReassemblyStats::default());
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            read_task(socket, stream_type, config, frame_tx, stats_tx, task_cancel).await;
        });

        Ok(Self {
            stream_type,
            frames: ReceiverStream::new(frame_rx),
            stats: stats_rx,
            source_hz: config.source_hz,
            cancel,
        })
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Reassembly counters as of the last processed message.
    pub fn stats(&self) -> ReassemblyStats {
        *self.stats.borrow()
    }

    /// Reassembly counters that stay readable after [`subscribe`](Self::subscribe)
    /// consumes the client.
    pub fn stats_receiver(&self) -> watch::Receiver<ReassemblyStats> {
        self.stats.clone()
    }

    /// Decoded frames at the requested rate. Errors are logged and skipped.
    pub fn subscribe(self, rate: UpdateRate) -> Pin<Box<dyn Stream<Item = Frame> + Send>> {
        let stream_type = self.stream_type;
        let interval = rate.throttle_interval(self.source_hz);

        let frames = self.filter_map(move |item| async move {
            match item {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("Skipping {} frame: {}", stream_type, e);
                    None
                }
            }
        });

        match interval {
            None => frames.boxed(),
            Some(interval) => frames.throttle(interval).boxed(),
        }
    }

    /// Close the connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Stream for StreamClient {
    type Item = Result<Frame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_next_unpin(cx)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        debug!("Dropping {} client", self.stream_type);
        self.cancel.cancel();
    }
}

async fn read_task(
    mut socket: Socket,
    stream_type: StreamType,
    config: ClientConfig,
    frames: mpsc::Sender<Result<Frame>>,
    stats: watch::Sender<ReassemblyStats>,
    cancel: CancellationToken,
) {
    let mut receiver = FrameReceiver::new(config.reassembly);
    let mut expiry = tokio::time::interval(config.expire_interval);
    expiry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = socket.close(None).await;
                break;
            }
            _ = expiry.tick() => {
                receiver.expire(Instant::now());
                continue;
            }
            message = socket.next() => match message {
                None => break,
                Some(Err(e)) => Some(Err(StreamError::from(e))),
                Some(Ok(Message::Binary(bytes))) => receiver.handle_message(&bytes).transpose(),
                Some(Ok(Message::Text(text))) => Some(Err(remote_error(text.as_str()))),
                Some(Ok(Message::Ping(payload))) => {
                    let _ = socket.send(Message::Pong(payload)).await;
                    None
                }
                Some(Ok(Message::Close(_))) => break,
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => None,
            },
        };

        stats.send_replace(receiver.stats());

        let Some(item) = item else { continue };
        let fatal = matches!(&item, Err(e) if !e.is_frame_local());
        if frames.send(item).await.is_err() || fatal {
            break;
        }
    }

    receiver.close();
    info!("{} connection closed: {:?}", stream_type, receiver.stats());
}

fn remote_error(text: &str) -> StreamError {
    match serde_json::from_str::<RemoteError>(text) {
        Ok(remote) => StreamError::Remote { message: remote.error },
        Err(_) => StreamError::Remote { message: text.to_string() },
    }
}
