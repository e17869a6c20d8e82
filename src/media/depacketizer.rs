//! Play path: RTMP audio/video messages to frames
//!
//! Frames are only released after their track's sequence header has been
//! seen; anything earlier is dropped. Timestamps leaving here never go
//! backwards within a track.
//!
//! Video with the enhanced RTMP header is accepted for FourCC `hvc1`.

use bytes::Bytes;

use crate::error::Result;
use crate::media::aac::{AacPacket, AacPacketType, AudioSpecificConfig};
use crate::media::enhanced::{is_enhanced, ExVideoPacket, VideoPacketType, HEVC_FOURCC};
use crate::media::flv::{codec_of, VideoFrameType};
use crate::media::frame::{Codec, CodecConfig, MediaFrame, MediaKind};
use crate::media::h264::{AvcConfig, AvcPacket, AvcPacketType};
use crate::media::hevc::HevcConfig;

/// Output of [`Depacketizer::push`]
#[derive(Debug, Clone, PartialEq)]
pub enum Depacketized {
    Configured(CodecConfig),
    Frame(MediaFrame),
}

#[derive(Debug, Default)]
struct PlayTrack {
    configured: bool,
    last_timestamp: Option<u32>,
    unsupported_warned: bool,
    dropped: u64,
}

impl PlayTrack {
    fn monotonic(&mut self, timestamp: u32) -> u32 {
        let ts = match self.last_timestamp {
            Some(last) if timestamp < last => last,
            _ => timestamp,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// Play-side depacketizer for one media stream
#[derive(Debug, Default)]
pub struct Depacketizer {
    video: PlayTrack,
    audio: PlayTrack,
}

impl Depacketizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&mut self, kind: MediaKind) -> &mut PlayTrack {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Frames dropped for arriving before their sequence header
    pub fn dropped(&self) -> u64 {
        self.video.dropped + self.audio.dropped
    }

    /// Handle one audio or video message body
    pub fn push(&mut self, kind: MediaKind, timestamp: u32, payload: Bytes) -> Result<Option<Depacketized>> {
        let Some(&first) = payload.first() else {
            return Ok(None);
        };

        if kind == MediaKind::Video && is_enhanced(first) {
            return self.push_enhanced(timestamp, payload);
        }

        let track = self.track(kind);
        let codec = match codec_of(kind, first) {
            Some(c) => c,
            None => {
                if !track.unsupported_warned {
                    tracing::warn!(kind = kind.name(), tag = first, "Unsupported codec, ignoring track");
                    track.unsupported_warned = true;
                }
                return Ok(None);
            }
        };

        let body = payload.slice(1..);
        match codec {
            Codec::H264 => self.push_avc(first, timestamp, body),
            Codec::Aac => self.push_aac(timestamp, body),
            Codec::H265 => Ok(None),
        }
    }

    fn push_enhanced(&mut self, timestamp: u32, payload: Bytes) -> Result<Option<Depacketized>> {
        let packet = ExVideoPacket::parse(payload)?;
        let track = &mut self.video;
        if packet.fourcc != HEVC_FOURCC {
            if !track.unsupported_warned {
                tracing::warn!(fourcc = %packet.fourcc_str(), "Unsupported video FourCC, ignoring track");
                track.unsupported_warned = true;
            }
            return Ok(None);
        }
        if packet.frame_type == Some(VideoFrameType::VideoInfoFrame) {
            return Ok(None);
        }

        match packet.packet_type {
            VideoPacketType::SequenceStart => {
                let config = HevcConfig::parse(packet.body)?;
                tracing::debug!(
                    profile = config.profile_name(),
                    level = %config.level_string(),
                    "HEVC video configured"
                );
                track.configured = true;
                Ok(Some(Depacketized::Configured(CodecConfig::Hevc(config))))
            }
            VideoPacketType::CodedFrames | VideoPacketType::CodedFramesX => {
                if !track.configured {
                    track.dropped += 1;
                    tracing::trace!(timestamp = timestamp, "Video before sequence header, dropping");
                    return Ok(None);
                }
                let keyframe = packet.frame_type.map(|f| f.is_keyframe()).unwrap_or(false);
                let ts = track.monotonic(timestamp);
                Ok(Some(Depacketized::Frame(
                    MediaFrame::h265(ts, keyframe, packet.body)
                        .with_composition_time(packet.composition_time),
                )))
            }
            _ => Ok(None),
        }
    }

    fn push_avc(&mut self, tag: u8, timestamp: u32, body: Bytes) -> Result<Option<Depacketized>> {
        let frame_type = VideoFrameType::from_byte(tag);
        if frame_type == Some(VideoFrameType::VideoInfoFrame) {
            return Ok(None);
        }

        let packet = AvcPacket::parse(body)?;
        let track = &mut self.video;
        match packet.packet_type {
            AvcPacketType::SequenceHeader => {
                let config = AvcConfig::parse(packet.body)?;
                tracing::debug!(
                    profile = config.profile_name(),
                    level = %config.level_string(),
                    "Video configured"
                );
                track.configured = true;
                Ok(Some(Depacketized::Configured(CodecConfig::Video(config))))
            }
            AvcPacketType::Nalu => {
                if !track.configured {
                    track.dropped += 1;
                    tracing::trace!(timestamp = timestamp, "Video before sequence header, dropping");
                    return Ok(None);
                }
                let keyframe = frame_type.map(|f| f.is_keyframe()).unwrap_or(false);
                let ts = track.monotonic(timestamp);
                Ok(Some(Depacketized::Frame(
                    MediaFrame::h264(ts, keyframe, packet.body)
                        .with_composition_time(packet.composition_time),
                )))
            }
            AvcPacketType::EndOfSequence => Ok(None),
        }
    }

    fn push_aac(&mut self, timestamp: u32, body: Bytes) -> Result<Option<Depacketized>> {
        let packet = AacPacket::parse(body)?;
        let track = &mut self.audio;
        match packet.packet_type {
            AacPacketType::SequenceHeader => {
                let config = AudioSpecificConfig::parse(packet.body)?;
                tracing::debug!(
                    sample_rate = config.sampling_frequency,
                    channels = config.channels(),
                    "Audio configured"
                );
                track.configured = true;
                Ok(Some(Depacketized::Configured(CodecConfig::Audio(config))))
            }
            AacPacketType::Raw => {
                if !track.configured {
                    track.dropped += 1;
                    return Ok(None);
                }
                let ts = track.monotonic(timestamp);
                Ok(Some(Depacketized::Frame(MediaFrame::aac(ts, packet.body))))
            }
        }
    }
}
