//! Encoded media units exchanged with the capture and render layers

use bytes::Bytes;

use crate::error::Result;
use crate::media::aac::AudioSpecificConfig;
use crate::media::h264::AvcConfig;
use crate::media::hevc::HevcConfig;

/// Audio or video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Codecs carried in RTMP payloads
///
/// H.265 uses the enhanced RTMP video header with FourCC `hvc1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    H265,
    Aac,
}

impl Codec {
    pub fn kind(&self) -> MediaKind {
        match self {
            Codec::H264 | Codec::H265 => MediaKind::Video,
            Codec::Aac => MediaKind::Audio,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::H264 => "h264",
            Codec::H265 => "h265",
            Codec::Aac => "aac",
        }
    }
}

/// One encoded access unit
///
/// `data` is the codec payload without the RTMP tag header: length-prefixed
/// NAL units for H.264 and H.265, a raw AAC frame for AAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub kind: MediaKind,
    pub codec: Codec,
    pub keyframe: bool,
    /// Presentation timestamp in milliseconds
    pub timestamp: u32,
    /// PTS - DTS offset for B-frames (video only)
    pub composition_time: i32,
    pub data: Bytes,
}

impl MediaFrame {
    pub fn h264(timestamp: u32, keyframe: bool, data: Bytes) -> Self {
        Self {
            kind: MediaKind::Video,
            codec: Codec::H264,
            keyframe,
            timestamp,
            composition_time: 0,
            data,
        }
    }

    pub fn h265(timestamp: u32, keyframe: bool, data: Bytes) -> Self {
        Self {
            codec: Codec::H265,
            ..Self::h264(timestamp, keyframe, data)
        }
    }

    pub fn aac(timestamp: u32, data: Bytes) -> Self {
        Self {
            kind: MediaKind::Audio,
            codec: Codec::Aac,
            keyframe: false,
            timestamp,
            composition_time: 0,
            data,
        }
    }

    pub fn with_composition_time(mut self, composition_time: i32) -> Self {
        self.composition_time = composition_time;
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// Codec configuration that must precede frames of its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    pub codec: Codec,
    /// AVC/HEVC decoder configuration record or AudioSpecificConfig bytes
    pub data: Bytes,
}

impl SequenceHeader {
    pub fn kind(&self) -> MediaKind {
        self.codec.kind()
    }

    pub fn avc(config: &AvcConfig) -> Self {
        Self {
            codec: Codec::H264,
            data: config.to_record(),
        }
    }

    /// Build an H.264 header straight from one SPS and one PPS NAL unit
    pub fn from_parameter_sets(sps: Bytes, pps: Bytes) -> Result<Self> {
        Ok(Self::avc(&AvcConfig::from_parameter_sets(sps, pps)?))
    }

    pub fn hevc(config: &HevcConfig) -> Self {
        Self {
            codec: Codec::H265,
            data: config.to_record(),
        }
    }

    /// Build an H.265 header from one VPS, SPS and PPS NAL unit
    pub fn from_hevc_parameter_sets(vps: Bytes, sps: Bytes, pps: Bytes) -> Result<Self> {
        Ok(Self::hevc(&HevcConfig::from_parameter_sets(vps, sps, pps)?))
    }

    pub fn aac(config: &AudioSpecificConfig) -> Self {
        Self {
            codec: Codec::Aac,
            data: config.raw.clone(),
        }
    }
}

/// Parsed codec configuration surfaced on the play path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecConfig {
    Video(AvcConfig),
    Hevc(HevcConfig),
    Audio(AudioSpecificConfig),
}

impl CodecConfig {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecConfig::Video(_) | CodecConfig::Hevc(_) => MediaKind::Video,
            CodecConfig::Audio(_) => MediaKind::Audio,
        }
    }
}
