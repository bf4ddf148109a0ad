//! Initial stream selection and track id parsing
//!
//! When a service starts, one audio and one video stream are picked from
//! the announced set by codec preference. Subtitles are never picked
//! automatically; they stay off until the player asks for one.

use crate::media::CodecId;

/// Relative preference when auto-selecting the initial stream of a kind
///
/// Higher scores win and the first announced stream keeps the slot on a
/// tie. Subtitle codecs score zero.
pub fn codec_score(id: CodecId) -> u32 {
    match id {
        CodecId::Mpeg2Audio => 1,
        CodecId::Aac => 2,
        CodecId::Ac3 => 3,
        CodecId::Eac3 => 4,
        CodecId::Mpeg2Video => 1,
        CodecId::H264 => 2,
        CodecId::Hevc => 3,
        CodecId::DvbSubtitle | CodecId::TextSubtitle => 0,
    }
}

/// Keeps the best-scoring stream seen so far for one component
#[derive(Debug, Default)]
pub struct StreamPick {
    best: Option<(u32, u32)>,
}

impl StreamPick {
    /// Offer a stream; it takes the slot only with a strictly higher score
    pub fn offer(&mut self, index: u32, score: u32) {
        match self.best {
            Some((held, _)) if score <= held => {}
            _ => self.best = Some((score, index)),
        }
    }

    /// Index of the winning stream, if any was offered
    pub fn index(&self) -> Option<u32> {
        self.best.map(|(_, index)| index)
    }
}

/// A parsed track id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelection {
    /// Route the stream with this index
    Stream(u32),
    /// Route nothing
    Off,
}

/// Parse a track id such as `audio:3`, `sub:0` or `off`
pub fn parse_track_id(id: &str) -> Option<TrackSelection> {
    let rest = id
        .strip_prefix("audio:")
        .or_else(|| id.strip_prefix("sub:"))
        .unwrap_or(id);

    if rest == "off" {
        return Some(TrackSelection::Off);
    }
    rest.parse().ok().map(TrackSelection::Stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_scores_are_ordered() {
        assert!(codec_score(CodecId::Aac) > codec_score(CodecId::Mpeg2Audio));
        assert!(codec_score(CodecId::Ac3) > codec_score(CodecId::Aac));
        assert!(codec_score(CodecId::Eac3) > codec_score(CodecId::Ac3));
    }

    #[test]
    fn test_video_scores_are_ordered() {
        assert!(codec_score(CodecId::H264) > codec_score(CodecId::Mpeg2Video));
        assert!(codec_score(CodecId::Hevc) > codec_score(CodecId::H264));
    }

    #[test]
    fn test_subtitle_scores_are_zero() {
        assert_eq!(codec_score(CodecId::DvbSubtitle), 0);
        assert_eq!(codec_score(CodecId::TextSubtitle), 0);
    }

    #[test]
    fn test_pick_prefers_higher_score() {
        let mut pick = StreamPick::default();
        pick.offer(0, codec_score(CodecId::Mpeg2Audio));
        pick.offer(1, codec_score(CodecId::Ac3));
        pick.offer(2, codec_score(CodecId::Aac));
        assert_eq!(pick.index(), Some(1));
    }

    #[test]
    fn test_pick_keeps_first_on_tie() {
        let mut pick = StreamPick::default();
        pick.offer(3, codec_score(CodecId::Ac3));
        pick.offer(7, codec_score(CodecId::Ac3));
        assert_eq!(pick.index(), Some(3));
    }

    #[test]
    fn test_pick_empty() {
        let pick = StreamPick::default();
        assert_eq!(pick.index(), None);
    }

    #[test]
    fn test_parse_track_ids() {
        assert_eq!(parse_track_id("audio:3"), Some(TrackSelection::Stream(3)));
        assert_eq!(parse_track_id("sub:0"), Some(TrackSelection::Stream(0)));
        assert_eq!(parse_track_id("off"), Some(TrackSelection::Off));
        assert_eq!(parse_track_id("audio:off"), Some(TrackSelection::Off));
        assert_eq!(parse_track_id("sub:off"), Some(TrackSelection::Off));
        assert_eq!(parse_track_id("audio:"), None);
        assert_eq!(parse_track_id("dvd:1"), None);
    }
}
