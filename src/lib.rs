//! HTSP client library for live TV streaming
//!
//! An async client for the Home TV Streaming Protocol spoken by
//! Tvheadend-style servers. It browses channels and tags, subscribes to
//! a channel, and feeds the elementary streams into a player-facing
//! media pipe.
//!
//! # Architecture
//!
//! ```text
//!        HtspClient
//!    browse / play_video
//!            │
//!            ▼
//!   ConnectionRegistry ──► Arc<Connection> ──► TCP (length-prefixed htsmsg)
//!                              │        ▲
//!                        reader task    │ call() stamps a seq
//!            ┌─────────────┬────────────┘
//!            ▼             ▼
//!         muxpkt       worker task (channelAdd, tagAdd,
//!            │             │        subscriptionStart, ...)
//!            ▼             ▼
//!   SubscriptionTable   MetaStore
//!            │
//!            ▼
//!        MediaPipe (audio / video / subtitle queues, tracks, status)
//! ```
//!
//! Requests are correlated to replies by sequence number, so any number
//! of tasks can call concurrently over one socket. Stream packets are
//! dispatched by the reader itself and never queue behind metadata
//! handling.
//!
//! # Example
//!
//! ```no_run
//! use htsp_rs::{ClientConfig, HtspClient, MediaPipe, PipeConfig};
//!
//! # async fn run() -> htsp_rs::Result<()> {
//! let client = HtspClient::new(ClientConfig::default());
//! let listing = client.browse("htsp://tv.local").await?;
//! println!("{listing:?}");
//!
//! let (pipe, queues) = MediaPipe::new(PipeConfig::default());
//! // hand `queues` to the decoders, then:
//! client.play_video("htsp://tv.local/channel/1", pipe, 0).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod media;
pub mod msg;
pub mod protocol;
pub mod subscription;

#[cfg(test)]
mod testutil;

pub use auth::{CredentialLookup, CredentialSource, Credentials};
pub use client::{ClientConfig, HtspClient, Listing, PlaybackEnd};
pub use connection::{Channel, EpgEvent, Tag};
pub use error::{Error, Result};
pub use media::{
    CodecContext, CodecId, MediaBuf, MediaPipe, MediaQueues, PipeConfig, PlaybackStatus,
    PlayerEvent, RemoteQueueStats, SourceMetadata, StreamKind, TrackInfo,
};
pub use msg::{Msg, MsgValue};
