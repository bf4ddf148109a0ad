//! Decode context descriptors
//!
//! The client never parses bitstreams. It builds one immutable
//! [`CodecContext`] per announced elementary stream, carrying just enough
//! for the playback side to construct a decoder, and shares it by
//! reference between the stream table and every buffer in flight.

use bytes::Bytes;

/// Playback component a stream feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

/// Codec of an elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    Mpeg2Audio,
    Aac,
    Ac3,
    Eac3,
    Mpeg2Video,
    H264,
    Hevc,
    DvbSubtitle,
    TextSubtitle,
}

impl CodecId {
    /// Parse the type name used in stream announcements
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "MPEG2AUDIO" => Some(CodecId::Mpeg2Audio),
            "AAC" => Some(CodecId::Aac),
            "AC3" => Some(CodecId::Ac3),
            "EAC3" => Some(CodecId::Eac3),
            "MPEG2VIDEO" => Some(CodecId::Mpeg2Video),
            "H264" => Some(CodecId::H264),
            "HEVC" => Some(CodecId::Hevc),
            "DVBSUB" => Some(CodecId::DvbSubtitle),
            "TEXTSUB" => Some(CodecId::TextSubtitle),
            _ => None,
        }
    }

    /// Short name shown in track listings
    pub fn display_name(&self) -> &'static str {
        match self {
            CodecId::Mpeg2Audio => "MPEG",
            CodecId::Aac => "AAC",
            CodecId::Ac3 => "AC3",
            CodecId::Eac3 => "EAC3",
            CodecId::Mpeg2Video => "MPEG-2",
            CodecId::H264 => "H264",
            CodecId::Hevc => "HEVC",
            CodecId::DvbSubtitle => "Bitmap",
            CodecId::TextSubtitle => "Text",
        }
    }

    /// Component this codec decodes into
    pub fn kind(&self) -> StreamKind {
        match self {
            CodecId::Mpeg2Audio | CodecId::Aac | CodecId::Ac3 | CodecId::Eac3 => StreamKind::Audio,
            CodecId::Mpeg2Video | CodecId::H264 | CodecId::Hevc => StreamKind::Video,
            CodecId::DvbSubtitle | CodecId::TextSubtitle => StreamKind::Subtitle,
        }
    }
}

/// Everything a decoder needs to be constructed
#[derive(Debug, Clone, PartialEq)]
pub struct CodecContext {
    pub id: CodecId,
    /// Picture size, when announced
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Codec-specific setup data (page ids for bitmap subtitles)
    pub extradata: Option<Bytes>,
}

impl CodecContext {
    /// Create a descriptor with no optional parameters
    pub fn new(id: CodecId) -> Self {
        Self {
            id,
            width: None,
            height: None,
            extradata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire() {
        assert_eq!(CodecId::from_wire("H264"), Some(CodecId::H264));
        assert_eq!(CodecId::from_wire("AC3"), Some(CodecId::Ac3));
        assert_eq!(CodecId::from_wire("TEXTSUB"), Some(CodecId::TextSubtitle));
        assert_eq!(CodecId::from_wire("VORBIS"), None);
        assert_eq!(CodecId::from_wire(""), None);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(CodecId::Aac.kind(), StreamKind::Audio);
        assert_eq!(CodecId::Eac3.kind(), StreamKind::Audio);
        assert_eq!(CodecId::Hevc.kind(), StreamKind::Video);
        assert_eq!(CodecId::Mpeg2Video.kind(), StreamKind::Video);
        assert_eq!(CodecId::DvbSubtitle.kind(), StreamKind::Subtitle);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CodecId::Mpeg2Audio.display_name(), "MPEG");
        assert_eq!(CodecId::Mpeg2Video.display_name(), "MPEG-2");
        assert_eq!(CodecId::DvbSubtitle.display_name(), "Bitmap");
        assert_eq!(CodecId::TextSubtitle.display_name(), "Text");
    }

    #[test]
    fn test_context_defaults() {
        let ctx = CodecContext::new(CodecId::H264);
        assert_eq!(ctx.id, CodecId::H264);
        assert!(ctx.width.is_none());
        assert!(ctx.height.is_none());
        assert!(ctx.extradata.is_none());
    }
}
