//! Media handling for HTSP streams
//!
//! This module provides:
//! - Codec identification for elementary streams
//! - Demultiplexed media buffers with codec context
//! - The playback pipe feeding audio/video/subtitle queues to a player

pub mod buffer;
pub mod codec;
pub mod pipe;

pub use buffer::MediaBuf;
pub use codec::{CodecContext, CodecId, StreamKind};
pub use pipe::{
    MediaPipe, MediaQueues, PipeConfig, PlaybackStatus, PlayerEvent, RemoteQueueStats,
    SourceMetadata, TrackInfo,
};
