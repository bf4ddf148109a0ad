//! Live stream dump
//!
//! Subscribes to a channel, drains the playback queues for a while and
//! prints what came through. Useful for checking that a server actually
//! delivers a channel before wiring up a real player.
//!
//! Run with: cargo run --example live_dump <URL> [SECONDS] [USER PASS]
//!
//! Examples:
//!   cargo run --example live_dump htsp://tv.local/channel/5
//!   cargo run --example live_dump htsp://tv.local:9982/channel/5 30
//!   cargo run --example live_dump htsp://tv.local/channel/5 10 admin secret

use std::time::Duration;

use htsp_rs::auth::StaticCredentials;
use htsp_rs::{
    ClientConfig, HtspClient, MediaBuf, MediaPipe, MediaQueues, PipeConfig, PlayerEvent,
    StreamKind,
};

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    buffers: u64,
    bytes: u64,
    last_dts: Option<i64>,
}

impl Totals {
    fn add(&mut self, buf: &MediaBuf) {
        self.buffers += 1;
        self.bytes += buf.payload.len() as u64;
        if buf.dts.is_some() {
            self.last_dts = buf.dts;
        }
    }
}

/// Drain all three queues until the pipe is torn down
async fn drain(mut queues: MediaQueues) -> [Totals; 3] {
    let mut audio = Totals::default();
    let mut video = Totals::default();
    let mut subtitle = Totals::default();
    let (mut audio_open, mut video_open, mut subtitle_open) = (true, true, true);

    while audio_open || video_open || subtitle_open {
        tokio::select! {
            buf = queues.audio.recv(), if audio_open => match buf {
                Some(buf) => audio.add(&buf),
                None => audio_open = false,
            },
            buf = queues.video.recv(), if video_open => match buf {
                Some(buf) => video.add(&buf),
                None => video_open = false,
            },
            buf = queues.subtitle.recv(), if subtitle_open => match buf {
                Some(buf) => subtitle.add(&buf),
                None => subtitle_open = false,
            },
        }
    }

    [audio, video, subtitle]
}

fn print_usage() {
    eprintln!("Usage: live_dump <URL> [SECONDS] [USER PASS]");
    eprintln!();
    eprintln!("  URL      htsp://host[:port]/channel/<id>");
    eprintln!("  SECONDS  how long to stay subscribed (default 10)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("htsp_rs=debug".parse()?),
        )
        .init();

    let url = args[1].clone();
    let seconds: u64 = match args.get(2) {
        Some(s) => match s.parse() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: bad duration {:?}", s);
                print_usage();
                std::process::exit(1);
            }
        },
        None => 10,
    };

    let mut config = ClientConfig::new();
    if let (Some(user), Some(pass)) = (args.get(3), args.get(4)) {
        config = config.credentials(StaticCredentials::new(user, pass));
    }
    let client = HtspClient::new(config);

    let (pipe, queues) = MediaPipe::new(PipeConfig::default());
    let drained = tokio::spawn(drain(queues));

    let stopper = pipe.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        stopper.post_event(PlayerEvent::Stop);
    });

    println!("Playing {} for {}s", url, seconds);
    let end = client.play_video(&url, pipe.clone(), 0).await?;
    println!("Playback ended: {:?}", end);
    // The timer's pipe clone would otherwise keep the queues open
    timer.abort();

    let meta = pipe.metadata();
    if let Some(title) = meta.title {
        println!("Channel: {}", title);
    }
    if let Some(format) = meta.format {
        println!("Source:  {}", format);
    }
    for track in pipe.tracks() {
        println!("Track:   {:<10} {:<8} {}", track.id, track.format, track.title);
    }

    let stats = pipe.remote_stats();
    println!(
        "Server queue: {} packets / {} bytes, {} dropped",
        stats.packets, stats.bytes, stats.drops
    );
    println!(
        "Local drops: audio {} video {} subtitle {}",
        pipe.dropped(StreamKind::Audio),
        pipe.dropped(StreamKind::Video),
        pipe.dropped(StreamKind::Subtitle),
    );

    // Dropping the last pipe handle closes the queues, ending the drain
    drop(pipe);
    let [audio, video, subtitle] = drained.await?;
    for (name, totals) in [("audio", audio), ("video", video), ("subtitle", subtitle)] {
        println!(
            "{:<8} {:>6} buffers, {:>10} bytes, last dts {:?}",
            name, totals.buffers, totals.bytes, totals.last_dts
        );
    }

    Ok(())
}
