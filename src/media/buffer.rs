//! Demultiplexed media buffers

use std::sync::Arc;

use bytes::Bytes;

use super::codec::{CodecContext, StreamKind};

/// One demultiplexed packet on its way to playback
///
/// Holds its originating stream's decode context by reference, so the
/// context outlives the stream table even when a buffer is still queued
/// after the subscription tore down.
#[derive(Debug, Clone)]
pub struct MediaBuf {
    /// Component the packet belongs to
    pub kind: StreamKind,
    /// Decode context of the stream; text subtitles carry none
    pub codec: Option<Arc<CodecContext>>,
    /// Elementary stream payload
    pub payload: Bytes,
    /// Decode timestamp, when the server sent one
    pub dts: Option<i64>,
    /// Presentation timestamp, when the server sent one
    pub pts: Option<i64>,
    /// Duration in microseconds, 0 when unknown
    pub duration: u32,
}
