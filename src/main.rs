use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use pointstream::config::{Config, SourceKind};
use pointstream::protocol::{FrameEncoder, ReassemblyStats, describe_message};
use pointstream::providers::{self, synthetic_scan};
use pointstream::recording::{RecordingHeader, RecordingReader, RecordingWriter};
use pointstream::{ClientConfig, Frame, StreamClient, StreamServer, StreamType, UpdateRate};

#[derive(Parser, Clone)]
#[command(version, about = "Stream range-sensor frames over WebSocket", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    #[command(about = "Run the WebSocket frame server")]
    Serve(ServeArgs),
    #[command(about = "Connect to a server and print received frames")]
    Listen(ListenArgs),
    #[command(about = "Write synthetic scans to a recording file")]
    Record(RecordArgs),
    #[command(about = "Print the wire messages a recording encodes to")]
    Inspect(InspectArgs),
}

#[derive(clap::Args, Clone, Debug)]
struct ServeArgs {
    #[clap(long, help = "Path to the YAML configuration file")]
    config: Option<PathBuf>,
    #[clap(long, help = "Address to bind the server to")]
    bind: Option<SocketAddr>,
    #[clap(long, help = "Frames per second")]
    fps: Option<u32>,
    #[clap(long, help = "Replay this recording instead of synthetic scans")]
    replay: Option<PathBuf>,
}

#[derive(clap::Args, Clone, Debug)]
struct ListenArgs {
    #[clap(long, default_value = "ws://127.0.0.1:8000", help = "Server base URL")]
    url: String,
    #[clap(
        long = "stream",
        default_value = "points3d",
        help = "Stream type to subscribe to, repeat for several streams"
    )]
    streams: Vec<StreamType>,
    #[clap(long, conflicts_with = "streams", help = "Subscribe to every stream type")]
    all: bool,
    #[clap(long, help = "Stop each stream after this many frames")]
    frames: Option<u64>,
    #[clap(long, default_value = "native", help = "Delivery rate: native or max frames per second")]
    rate: UpdateRate,
}

impl ListenArgs {
    fn stream_types(&self) -> Vec<StreamType> {
        if self.all {
            return StreamType::ALL.to_vec();
        }
        let mut streams = Vec::with_capacity(self.streams.len());
        for stream_type in &self.streams {
            if !streams.contains(stream_type) {
                streams.push(*stream_type);
            }
        }
        streams
    }
}

#[derive(clap::Args, Clone, Debug)]
struct RecordArgs {
    #[clap(long, help = "Recording file to write")]
    out: PathBuf,
    #[clap(long, default_value_t = 100, help = "Number of scans to record")]
    frames: u64,
    #[clap(long, help = "Path to the YAML configuration file")]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Clone, Debug)]
struct InspectArgs {
    #[clap(help = "Recording file to inspect")]
    path: PathBuf,
    #[clap(long, default_value = "points3d", help = "Stream type to encode scans as")]
    stream: StreamType,
    #[clap(long, help = "Only inspect the first N scans")]
    scans: Option<usize>,
    #[clap(long, help = "Path to the YAML configuration file")]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Listen(args) => listen(args).await,
        Commands::Record(args) => record(args),
        Commands::Inspect(args) => inspect(args),
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(replay) = args.replay {
        config.source.kind = SourceKind::Replay;
        config.source.path = Some(replay);
    }
    config.validate()?;

    let provider = providers::from_config(&config)?;
    let server = StreamServer::bind(config.bind, config.chunking, provider).await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown.cancel();
        }
    });

    server.run().await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListenSummary {
    stream_type: StreamType,
    frames: u64,
    bytes: u64,
    stats: ReassemblyStats,
}

impl ListenSummary {
    fn new(stream_type: StreamType) -> Self {
        Self { stream_type, frames: 0, bytes: 0, stats: ReassemblyStats::default() }
    }

    fn record(&mut self, frame: &Frame) {
        self.frames += 1;
        self.bytes += frame.byte_len() as u64;
    }

    /// Frames the client reassembled or decoded, including ones it dropped
    /// because the consumer was lagging.
    fn received(&self) -> u64 {
        self.stats.frames_completed + self.stats.standard_frames
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

async fn listen(args: ListenArgs) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, closing streams");
            interrupt.cancel();
        }
    });

    let mut tasks = JoinSet::new();
    for stream_type in args.stream_types() {
        tasks.spawn(listen_stream(args.url.clone(), stream_type, args.rate, args.frames, cancel.clone()));
    }

    let mut summaries = Vec::new();
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("listener task failed")? {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!("{:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error.filter(|_| summaries.is_empty()) {
        return Err(e);
    }

    summaries.sort_by_key(|summary| summary.stream_type);
    print_summaries(&summaries);
    Ok(())
}

async fn listen_stream(
    url: String,
    stream_type: StreamType,
    rate: UpdateRate,
    limit: Option<u64>,
    cancel: CancellationToken,
) -> anyhow::Result<ListenSummary> {
    let client = StreamClient::connect(&url, stream_type, ClientConfig::default())
        .await
        .with_context(|| format!("connecting to {} at {}", stream_type, url))?;

    let stats = client.stats_receiver();
    let mut frames = client.subscribe(rate);
    let mut summary = ListenSummary::new(stream_type);
    while limit.is_none_or(|limit| summary.frames < limit) {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.next() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        summary.record(&frame);
        println!(
            "{} frame {:>6}  shape {:<14} range [{:>9.3}, {:>9.3}]  {} bytes",
            frame.stream_type,
            frame.frame_number,
            frame.shape.to_string(),
            frame.min_val,
            frame.max_val,
            frame.byte_len()
        );
    }

    summary.stats = *stats.borrow();
    debug!(stream = %stream_type, stats = ?summary.stats, "Stream closed");
    Ok(summary)
}

fn print_summaries(summaries: &[ListenSummary]) {
    println!("{:<15} {:>8} {:>9} {:>10}", "stream", "frames", "received", "MB");
    for summary in summaries {
        println!(
            "{:<15} {:>8} {:>9} {:>10.2}",
            summary.stream_type.name(),
            summary.frames,
            summary.received(),
            megabytes(summary.bytes)
        );
    }
    let total: u64 = summaries.iter().map(|summary| summary.bytes).sum();
    println!("Total data received: {:.2} MB", megabytes(total));
}

fn record(args: RecordArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    let (rows, cols) = (config.source.rows, config.source.cols);
    if args.frames == 0 {
        bail!("--frames must be greater than zero");
    }

    let header = RecordingHeader::new(config.fps as f32, rows, cols);
    let mut writer = RecordingWriter::create(&args.out, header)?;
    for index in 0..args.frames {
        writer.write_scan(&synthetic_scan(rows, cols, index))?;
    }
    let written = writer.finish()?;

    println!("Recorded {} {}x{} scans to {}", written, rows, cols, args.out.display());
    Ok(())
}

fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    let encoder = FrameEncoder::new(config.chunking)?;
    let reader = RecordingReader::open(&args.path)
        .with_context(|| format!("opening recording {}", args.path.display()))?;

    let header = *reader.header();
    println!(
        "{}: version {}, {}x{} scans at {}Hz",
        args.path.display(),
        header.version,
        header.rows,
        header.cols,
        header.tick_rate
    );

    let limit = args.scans.unwrap_or(usize::MAX);
    for (index, scan) in reader.take(limit).enumerate() {
        let frame = scan?.to_frame(args.stream, index as u32)?;
        for message in encoder.encode(&frame)? {
            println!("  {}", describe_message(&message)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointstream::Shape;

    fn listen_args(argv: &[&str]) -> ListenArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Listen(args) => args,
            _ => panic!("expected the listen subcommand"),
        }
    }

    #[test]
    fn listen_defaults_to_points() {
        let args = listen_args(&["pointstream", "listen"]);
        assert_eq!(args.stream_types(), vec![StreamType::Points3d]);
        assert_eq!(args.frames, None);
    }

    #[test]
    fn listen_accepts_repeated_streams() {
        let args = listen_args(&[
            "pointstream",
            "listen",
            "--stream",
            "range2d",
            "--stream",
            "reflectivity3d",
            "--stream",
            "range2d",
            "--frames",
            "10",
        ]);
        assert_eq!(args.stream_types(), vec![StreamType::Range2d, StreamType::Reflectivity3d]);
        assert_eq!(args.frames, Some(10));
    }

    #[test]
    fn listen_all_covers_every_stream() {
        let args = listen_args(&["pointstream", "listen", "--all"]);
        assert_eq!(args.stream_types(), StreamType::ALL.to_vec());
        assert!(Cli::try_parse_from(["pointstream", "listen", "--all", "--stream", "points3d"]).is_err());
    }

    #[test]
    fn summary_counts_frames_and_bytes() {
        let mut summary = ListenSummary::new(StreamType::Range2d);
        let frame = Frame::from_payload(StreamType::Range2d, 0, Shape::new(2, 3), vec![0.0; 6]).unwrap();
        summary.record(&frame);
        summary.record(&frame);
        summary.stats.frames_completed = 1;
        summary.stats.standard_frames = 2;
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.bytes, 48);
        assert_eq!(summary.received(), 3);
        assert!((megabytes(1024 * 1024) - 1.0).abs() < f64::EPSILON);
    }
}
