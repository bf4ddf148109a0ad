//! Subscription tracking and stream demultiplexing
//!
//! One table per connection maps subscription ids to their playback pipes
//! and announced elementary streams. Metadata handlers rebuild entries
//! when the server (re)starts a service; muxpkt routing runs on the reader
//! task. Every handler takes the table lock briefly and never touches the
//! network, so stream data cannot stall metadata or vice versa.

pub mod select;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::media::{
    CodecContext, CodecId, MediaBuf, MediaPipe, PlaybackStatus, PlayerEvent, RemoteQueueStats,
    StreamKind, TrackInfo,
};
use crate::msg::Msg;

pub use select::{codec_score, parse_track_id, StreamPick, TrackSelection};

/// One announced elementary stream within a subscription
#[derive(Debug, Clone)]
pub struct SubStream {
    /// Server-assigned stream index within the mux
    pub index: u32,
    /// Component the stream feeds
    pub kind: StreamKind,
    /// Decoder setup; `None` for text subtitles
    pub codec: Option<Arc<CodecContext>>,
    /// Selection id published to the player
    pub track_id: String,
}

/// Live state for one subscription
#[derive(Debug)]
pub struct Subscription {
    /// Subscription id used on the wire
    pub sid: u32,
    /// Pipe receiving the demultiplexed buffers
    pub pipe: MediaPipe,
    /// Streams announced by the last service start
    pub streams: Vec<SubStream>,
    /// Stream index currently routed to the audio queue
    pub audio_stream: Option<u32>,
    /// Stream index currently routed to the video queue
    pub video_stream: Option<u32>,
    /// Stream index currently routed to the subtitle queue
    pub subtitle_stream: Option<u32>,
}

impl Subscription {
    fn new(sid: u32, pipe: MediaPipe) -> Self {
        Self {
            sid,
            pipe,
            streams: Vec::new(),
            audio_stream: None,
            video_stream: None,
            subtitle_stream: None,
        }
    }

    fn reset_streams(&mut self) {
        self.streams.clear();
        self.audio_stream = None;
        self.video_stream = None;
        self.subtitle_stream = None;
    }
}

/// Subscription registry shared by the reader task and the session tasks
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    inner: Mutex<HashMap<u32, Subscription>>,
}

impl SubscriptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription; must happen before the subscribe request
    /// goes out, or an early muxpkt could race past it
    pub fn insert(&self, sid: u32, pipe: MediaPipe) {
        self.inner
            .lock()
            .unwrap()
            .insert(sid, Subscription::new(sid, pipe));
    }

    /// Drop a subscription and return it
    pub fn remove(&self, sid: u32) -> Option<Subscription> {
        self.inner.lock().unwrap().remove(&sid)
    }

    /// Clone the pipe handle of a subscription
    pub fn pipe(&self, sid: u32) -> Option<MediaPipe> {
        self.inner.lock().unwrap().get(&sid).map(|s| s.pipe.clone())
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Check whether any subscriptions are live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tell every subscription that the connection is gone
    pub fn connection_lost(&self) {
        let table = self.inner.lock().unwrap();
        for sub in table.values() {
            sub.pipe.post_event(PlayerEvent::ConnectionLost);
        }
    }

    /// Handle a service start: rebuild the stream set for the subscription
    ///
    /// Picks the initial audio and video streams by codec preference and
    /// publishes the selectable audio and subtitle tracks. A restart (new
    /// start without a stop) replaces the previous set wholesale.
    pub fn service_start(&self, m: &Msg) {
        let Some(sid) = m.get_u32("subscriptionId") else {
            return;
        };
        let mut table = self.inner.lock().unwrap();
        let Some(sub) = table.get_mut(&sid) else {
            tracing::warn!(sid = sid, "Service start for unknown subscription");
            return;
        };

        tracing::debug!(sid = sid, "Service started");

        sub.reset_streams();
        sub.pipe.clear_tracks();

        if let Some(sourceinfo) = m.get_map("sourceinfo") {
            let service = sourceinfo.get_str("service").unwrap_or("<?>");
            let mux = sourceinfo.get_str("mux").unwrap_or("<?>");
            sub.pipe
                .set_format(&format!("HTSP TV \"{service}\" from \"{mux}\""));
        }

        let mut audio_pick = StreamPick::default();
        let mut video_pick = StreamPick::default();

        if let Some(streams) = m.get_list("streams") {
            for entry in streams {
                let Some(stream) = entry.as_map() else {
                    continue;
                };
                let Some(wire_type) = stream.get_str("type") else {
                    continue;
                };
                let Some(index) = stream.get_u32("index") else {
                    continue;
                };

                let Some(codec_id) = CodecId::from_wire(wire_type) else {
                    tracing::debug!(
                        index = index,
                        stream_type = wire_type,
                        "Skipping stream with unknown type"
                    );
                    continue;
                };

                let kind = codec_id.kind();
                let language = stream.get_str("language").map(str::to_string);
                let codec = build_codec(codec_id, index, stream);

                let track_id = match kind {
                    StreamKind::Audio => format!("audio:{index}"),
                    StreamKind::Video => format!("video:{index}"),
                    StreamKind::Subtitle => format!("sub:{index}"),
                };

                match kind {
                    StreamKind::Audio => {
                        audio_pick.offer(index, codec_score(codec_id));
                        sub.pipe.publish_track(track_info(
                            &track_id, codec_id, &language, index, kind,
                        ));
                    }
                    StreamKind::Video => {
                        video_pick.offer(index, codec_score(codec_id));
                    }
                    StreamKind::Subtitle => {
                        sub.pipe.publish_track(track_info(
                            &track_id, codec_id, &language, index, kind,
                        ));
                    }
                }

                tracing::debug!(
                    index = index,
                    codec = codec_id.display_name(),
                    language = language.as_deref().unwrap_or(""),
                    "Stream announced"
                );

                sub.streams.push(SubStream {
                    index,
                    kind,
                    codec,
                    track_id,
                });
            }
        }

        sub.audio_stream = audio_pick.index();
        sub.video_stream = video_pick.index();

        let current = sub.audio_stream.map(|index| format!("audio:{index}"));
        sub.pipe.set_current_audio(current.as_deref());

        sub.pipe.set_status(PlaybackStatus::Play);
    }

    /// Handle a service stop: drop the streams but keep the entry alive
    /// so a later restart can reuse it
    pub fn service_stop(&self, m: &Msg) {
        let Some(sid) = m.get_u32("subscriptionId") else {
            return;
        };
        let mut table = self.inner.lock().unwrap();
        let Some(sub) = table.get_mut(&sid) else {
            return;
        };

        tracing::debug!(sid = sid, "Service stopped");
        sub.reset_streams();
    }

    /// Handle a status update: surface or clear the server-side error
    pub fn service_status(&self, m: &Msg) {
        let Some(sid) = m.get_u32("subscriptionId") else {
            return;
        };
        let status = m.get_str("status");

        let table = self.inner.lock().unwrap();
        let Some(sub) = table.get(&sid) else {
            return;
        };

        sub.pipe.set_error(status);
        if let Some(status) = status {
            tracing::error!(sid = sid, status = status, "Subscription degraded");
        }
    }

    /// Handle a queue status report from the server
    pub fn queue_status(&self, m: &Msg) {
        let Some(sid) = m.get_u32("subscriptionId") else {
            return;
        };
        let table = self.inner.lock().unwrap();
        let Some(sub) = table.get(&sid) else {
            return;
        };

        let drops = u64::from(m.get_u32("Bdrops").unwrap_or(0))
            + u64::from(m.get_u32("Pdrops").unwrap_or(0))
            + u64::from(m.get_u32("Idrops").unwrap_or(0));

        sub.pipe.set_remote_stats(RemoteQueueStats {
            drops,
            packets: m.get_u32("packets").unwrap_or(0),
            bytes: m.get_u32("bytes").unwrap_or(0),
        });
    }

    /// Route one muxpkt to the pipe of its subscription
    ///
    /// Packets for streams that are not currently routed are dropped
    /// without logging; that is the steady state for every stream the
    /// player did not select.
    pub fn mux_input(&self, m: &Msg) {
        let Some(sid) = m.get_u32("subscriptionId") else {
            return;
        };
        let Some(stream) = m.get_u32("stream") else {
            return;
        };
        let Some(payload) = m.get_bin("payload") else {
            return;
        };

        let table = self.inner.lock().unwrap();
        let Some(sub) = table.get(&sid) else {
            return;
        };

        let routed = sub.audio_stream == Some(stream)
            || sub.video_stream == Some(stream)
            || sub.subtitle_stream == Some(stream);
        if !routed {
            return;
        }

        let Some(entry) = sub.streams.iter().find(|s| s.index == stream) else {
            return;
        };

        sub.pipe.enqueue(MediaBuf {
            kind: entry.kind,
            codec: entry.codec.clone(),
            payload: payload.clone(),
            dts: m.get_s64("dts"),
            pts: m.get_s64("pts"),
            duration: m.get_u32("duration").unwrap_or(0),
        });
    }

    /// Switch the stream feeding the audio queue
    ///
    /// Purely local: the server keeps sending every stream, only the
    /// routing changes.
    pub fn select_audio(&self, sid: u32, id: &str) {
        let Some(selection) = parse_track_id(id) else {
            tracing::warn!(sid = sid, id = id, "Unparsable audio track id");
            return;
        };
        let mut table = self.inner.lock().unwrap();
        let Some(sub) = table.get_mut(&sid) else {
            return;
        };

        match selection {
            TrackSelection::Off => {
                sub.audio_stream = None;
                sub.pipe.set_current_audio(None);
            }
            TrackSelection::Stream(index) => {
                let known = sub
                    .streams
                    .iter()
                    .any(|s| s.index == index && s.kind == StreamKind::Audio);
                if !known {
                    tracing::warn!(sid = sid, index = index, "Audio track not announced");
                    return;
                }
                sub.audio_stream = Some(index);
                sub.pipe.set_current_audio(Some(id));
            }
        }
    }

    /// Switch the stream feeding the subtitle queue
    pub fn select_subtitle(&self, sid: u32, id: &str) {
        let Some(selection) = parse_track_id(id) else {
            tracing::warn!(sid = sid, id = id, "Unparsable subtitle track id");
            return;
        };
        let mut table = self.inner.lock().unwrap();
        let Some(sub) = table.get_mut(&sid) else {
            return;
        };

        match selection {
            TrackSelection::Off => {
                sub.subtitle_stream = None;
                sub.pipe.set_current_subtitle(None);
            }
            TrackSelection::Stream(index) => {
                let known = sub
                    .streams
                    .iter()
                    .any(|s| s.index == index && s.kind == StreamKind::Subtitle);
                if !known {
                    tracing::warn!(sid = sid, index = index, "Subtitle track not announced");
                    return;
                }
                sub.subtitle_stream = Some(index);
                sub.pipe.set_current_subtitle(Some(id));
            }
        }
    }
}

fn track_info(
    track_id: &str,
    codec_id: CodecId,
    language: &Option<String>,
    index: u32,
    kind: StreamKind,
) -> TrackInfo {
    TrackInfo {
        id: track_id.to_string(),
        format: codec_id.display_name().to_string(),
        language: language.clone(),
        title: language
            .clone()
            .unwrap_or_else(|| format!("Stream {index}")),
        kind,
    }
}

/// Build the decoder setup for an announced stream
fn build_codec(id: CodecId, index: u32, stream: &Msg) -> Option<Arc<CodecContext>> {
    if id == CodecId::TextSubtitle {
        // Text subtitles carry no decoder setup
        return None;
    }

    let mut ctx = CodecContext::new(id);
    ctx.width = stream.get_u32("width");
    ctx.height = stream.get_u32("height");

    if id == CodecId::DvbSubtitle {
        let composition_id = stream.get_u32("composition_id").unwrap_or_else(|| {
            tracing::error!(index = index, "Subtitle stream missing composition id");
            0
        });
        let ancillary_id = stream.get_u32("ancillary_id").unwrap_or_else(|| {
            tracing::error!(index = index, "Subtitle stream missing ancillary id");
            0
        });
        ctx.extradata = Some(Bytes::copy_from_slice(&[
            (composition_id >> 8) as u8,
            composition_id as u8,
            (ancillary_id >> 8) as u8,
            ancillary_id as u8,
        ]));
    }

    Some(Arc::new(ctx))
}
