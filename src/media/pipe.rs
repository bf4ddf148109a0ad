//! Playback-facing pipe
//!
//! The pipe is the seam between this crate and the embedder's playback
//! machinery: bounded per-component queues fed by the demultiplexer, plus
//! playback status, track metadata and the event channel the playback
//! session consumes. Enqueueing never blocks; when a queue is full the
//! buffer is dropped, because late live TV data is worth less than a
//! stalled reader.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::buffer::MediaBuf;
use super::codec::StreamKind;

/// Default depth of the audio and video queues
const DEFAULT_AV_QUEUE_LEN: usize = 64;

/// Default depth of the subtitle queue
const DEFAULT_SUBTITLE_QUEUE_LEN: usize = 16;

/// Queue capacities for a pipe
///
/// Depths below one are raised to one when the pipe is built.
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Audio queue depth
    pub audio_queue_len: usize,
    /// Video queue depth
    pub video_queue_len: usize,
    /// Subtitle queue depth
    pub subtitle_queue_len: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            audio_queue_len: DEFAULT_AV_QUEUE_LEN,
            video_queue_len: DEFAULT_AV_QUEUE_LEN,
            subtitle_queue_len: DEFAULT_SUBTITLE_QUEUE_LEN,
        }
    }
}

impl PipeConfig {
    /// Create a config with default queue depths
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the audio queue depth
    pub fn audio_queue_len(mut self, len: usize) -> Self {
        self.audio_queue_len = len;
        self
    }

    /// Set the video queue depth
    pub fn video_queue_len(mut self, len: usize) -> Self {
        self.video_queue_len = len;
        self
    }

    /// Set the subtitle queue depth
    pub fn subtitle_queue_len(mut self, len: usize) -> Self {
        self.subtitle_queue_len = len;
        self
    }
}

/// Playback state reflected to the embedder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Waiting for the subscription to start
    Loading,
    /// Stream data is flowing
    Play,
    /// Playback ended
    Stop,
}

/// Commands and notifications consumed by the playback session
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Switch audio track: `audio:3` selects a stream, `audio:off` mutes
    SelectAudioTrack(String),
    /// Switch subtitle track: `sub:2` selects a stream, `sub:off` hides
    SelectSubtitleTrack(String),
    /// End playback
    Stop,
    /// The connection died underneath the session
    ConnectionLost,
}

/// A selectable elementary-stream track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Selection id, e.g. `audio:3` or `sub:0`
    pub id: String,
    /// Codec display name
    pub format: String,
    /// Language, when announced
    pub language: Option<String>,
    /// Display title: the language when known, `Stream N` otherwise
    pub title: String,
    /// Component the track feeds
    pub kind: StreamKind,
}

/// Descriptive metadata about the playing source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    /// Channel name
    pub title: Option<String>,
    /// Channel icon URL
    pub icon: Option<String>,
    /// Channel number
    pub channel_number: Option<u32>,
    /// Transport description, e.g. `HTSP TV "SVT1" from "Southern Mux"`
    pub format: Option<String>,
}

/// Server-side queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteQueueStats {
    /// Packets the server dropped before sending
    pub drops: u64,
    /// Packets queued at the server
    pub packets: u32,
    /// Bytes queued at the server
    pub bytes: u32,
}

/// Consumer half of a pipe: the queues a player drains
#[derive(Debug)]
pub struct MediaQueues {
    pub audio: mpsc::Receiver<MediaBuf>,
    pub video: mpsc::Receiver<MediaBuf>,
    pub subtitle: mpsc::Receiver<MediaBuf>,
}

#[derive(Debug)]
struct TrackState {
    entries: Vec<TrackInfo>,
    current_audio: Option<String>,
    current_subtitle: Option<String>,
}

#[derive(Debug)]
struct PipeShared {
    audio_tx: mpsc::Sender<MediaBuf>,
    video_tx: mpsc::Sender<MediaBuf>,
    subtitle_tx: mpsc::Sender<MediaBuf>,
    audio_drops: AtomicU64,
    video_drops: AtomicU64,
    subtitle_drops: AtomicU64,
    event_tx: mpsc::UnboundedSender<PlayerEvent>,
    event_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PlayerEvent>>,
    status: Mutex<PlaybackStatus>,
    tracks: Mutex<TrackState>,
    metadata: Mutex<SourceMetadata>,
    error: Mutex<Option<String>>,
    remote_stats: Mutex<RemoteQueueStats>,
}

/// Handle to a playback pipe; clones share the same pipe
#[derive(Debug, Clone)]
pub struct MediaPipe {
    shared: Arc<PipeShared>,
}

impl MediaPipe {
    /// Create a pipe, returning the handle and the consumer queues
    pub fn new(config: PipeConfig) -> (Self, MediaQueues) {
        let (audio_tx, audio_rx) = mpsc::channel(config.audio_queue_len.max(1));
        let (video_tx, video_rx) = mpsc::channel(config.video_queue_len.max(1));
        let (subtitle_tx, subtitle_rx) = mpsc::channel(config.subtitle_queue_len.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let pipe = Self {
            shared: Arc::new(PipeShared {
                audio_tx,
                video_tx,
                subtitle_tx,
                audio_drops: AtomicU64::new(0),
                video_drops: AtomicU64::new(0),
                subtitle_drops: AtomicU64::new(0),
                event_tx,
                event_rx: tokio::sync::Mutex::new(event_rx),
                status: Mutex::new(PlaybackStatus::Loading),
                tracks: Mutex::new(TrackState {
                    entries: Vec::new(),
                    current_audio: None,
                    current_subtitle: None,
                }),
                metadata: Mutex::new(SourceMetadata::default()),
                error: Mutex::new(None),
                remote_stats: Mutex::new(RemoteQueueStats::default()),
            }),
        };

        let queues = MediaQueues {
            audio: audio_rx,
            video: video_rx,
            subtitle: subtitle_rx,
        };

        (pipe, queues)
    }

    /// Deliver a buffer to its component queue without blocking
    ///
    /// A full (or abandoned) queue drops the buffer and counts the drop.
    pub fn enqueue(&self, buf: MediaBuf) {
        let (tx, drops) = match buf.kind {
            StreamKind::Audio => (&self.shared.audio_tx, &self.shared.audio_drops),
            StreamKind::Video => (&self.shared.video_tx, &self.shared.video_drops),
            StreamKind::Subtitle => (&self.shared.subtitle_tx, &self.shared.subtitle_drops),
        };

        if tx.try_send(buf).is_err() {
            drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Buffers dropped so far on a component's queue
    pub fn dropped(&self, kind: StreamKind) -> u64 {
        let counter = match kind {
            StreamKind::Audio => &self.shared.audio_drops,
            StreamKind::Video => &self.shared.video_drops,
            StreamKind::Subtitle => &self.shared.subtitle_drops,
        };
        counter.load(Ordering::Relaxed)
    }

    /// Post an event for the playback session
    pub fn post_event(&self, event: PlayerEvent) {
        let _ = self.shared.event_tx.send(event);
    }

    /// Wait for the next playback event
    pub async fn next_event(&self) -> PlayerEvent {
        let mut rx = self.shared.event_rx.lock().await;
        // The pipe itself holds a sender, so the channel cannot close
        rx.recv().await.unwrap_or(PlayerEvent::Stop)
    }

    /// Current playback status
    pub fn status(&self) -> PlaybackStatus {
        *self.shared.status.lock().unwrap()
    }

    /// Set the playback status
    pub fn set_status(&self, status: PlaybackStatus) {
        *self.shared.status.lock().unwrap() = status;
    }

    /// Publish a selectable track
    pub fn publish_track(&self, track: TrackInfo) {
        self.shared.tracks.lock().unwrap().entries.push(track);
    }

    /// Withdraw all published tracks and forget the current selections
    pub fn clear_tracks(&self) {
        let mut state = self.shared.tracks.lock().unwrap();
        state.entries.clear();
        state.current_audio = None;
        state.current_subtitle = None;
    }

    /// Snapshot of the published tracks
    pub fn tracks(&self) -> Vec<TrackInfo> {
        self.shared.tracks.lock().unwrap().entries.clone()
    }

    /// Record the track currently feeding the audio queue
    pub fn set_current_audio(&self, id: Option<&str>) {
        self.shared.tracks.lock().unwrap().current_audio = id.map(str::to_string);
    }

    /// Track currently feeding the audio queue
    pub fn current_audio(&self) -> Option<String> {
        self.shared.tracks.lock().unwrap().current_audio.clone()
    }

    /// Record the track currently feeding the subtitle queue
    pub fn set_current_subtitle(&self, id: Option<&str>) {
        self.shared.tracks.lock().unwrap().current_subtitle = id.map(str::to_string);
    }

    /// Track currently feeding the subtitle queue
    pub fn current_subtitle(&self) -> Option<String> {
        self.shared.tracks.lock().unwrap().current_subtitle.clone()
    }

    /// Set the channel metadata shown while playing
    pub fn set_channel_info(&self, title: &str, icon: Option<&str>, channel_number: Option<u32>) {
        let mut meta = self.shared.metadata.lock().unwrap();
        meta.title = Some(title.to_string());
        meta.icon = icon.map(str::to_string);
        meta.channel_number = channel_number;
    }

    /// Set the transport format string
    pub fn set_format(&self, format: &str) {
        self.shared.metadata.lock().unwrap().format = Some(format.to_string());
    }

    /// Snapshot of the source metadata
    pub fn metadata(&self) -> SourceMetadata {
        self.shared.metadata.lock().unwrap().clone()
    }

    /// Record or clear the server-reported playback error
    pub fn set_error(&self, error: Option<&str>) {
        *self.shared.error.lock().unwrap() = error.map(str::to_string);
    }

    /// The server-reported playback error, if any
    pub fn error(&self) -> Option<String> {
        self.shared.error.lock().unwrap().clone()
    }

    /// Update the server-side queue statistics
    pub fn set_remote_stats(&self, stats: RemoteQueueStats) {
        *self.shared.remote_stats.lock().unwrap() = stats;
    }

    /// Latest server-side queue statistics
    pub fn remote_stats(&self) -> RemoteQueueStats {
        *self.shared.remote_stats.lock().unwrap()
    }
}
