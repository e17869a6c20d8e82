//! Publish path: frames to RTMP audio/video messages
//!
//! Timestamps are rebased so the first frame of the session goes out at 0.
//! Audio and video share that origin to keep them in sync. A frame older
//! than the previous one of its kind is clamped to the previous timestamp.
//!
//! A frame is refused until its track has a sequence header of the same
//! codec. A header goes out again only when the parameters change.
//!
//! H.265 uses the enhanced RTMP header (`SequenceStart`, `CodedFrames`).

use crate::error::{MediaError, Result};
use crate::media::aac::{aac_payload, AacPacketType};
use crate::media::enhanced::{ex_video_payload, VideoPacketType, HEVC_FOURCC};
use crate::media::frame::{Codec, MediaFrame, MediaKind, SequenceHeader};
use crate::media::h264::{avc_payload, AvcPacketType};
use crate::protocol::chunk::Message;
use crate::protocol::constants::{MSG_AUDIO, MSG_VIDEO};

#[derive(Debug, Default)]
struct PublishTrack {
    header: Option<SequenceHeader>,
    last_timestamp: Option<u32>,
}

/// Publish-side packetizer for one media stream
#[derive(Debug)]
pub struct Packetizer {
    stream_id: u32,
    origin: Option<u32>,
    video: PublishTrack,
    audio: PublishTrack,
}

impl Packetizer {
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            origin: None,
            video: PublishTrack::default(),
            audio: PublishTrack::default(),
        }
    }

    fn track(&mut self, kind: MediaKind) -> &mut PublishTrack {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Record codec parameters
    ///
    /// Returns the header message to send now, or `None` when the same
    /// parameters were already sent.
    pub fn push_sequence_header(&mut self, header: SequenceHeader) -> Option<Message> {
        let stream_id = self.stream_id;
        let track = self.track(header.kind());
        if track.header.as_ref() == Some(&header) {
            return None;
        }

        let timestamp = track.last_timestamp.unwrap_or(0);
        let message = header_message(&header, timestamp, stream_id);
        tracing::debug!(
            kind = header.kind().name(),
            codec = header.codec.name(),
            size = header.data.len(),
            "Sending sequence header"
        );
        track.header = Some(header);
        Some(message)
    }

    /// Packetize one frame
    ///
    /// A frame with no sequence header for its codec is refused with
    /// [`MediaError::MissingSequenceHeader`].
    pub fn push_frame(&mut self, frame: &MediaFrame) -> Result<Message> {
        if frame.data.is_empty() {
            return Err(MediaError::EmptyPayload.into());
        }
        match &self.track(frame.kind).header {
            Some(h) if h.codec == frame.codec => {}
            _ => return Err(MediaError::MissingSequenceHeader.into()),
        }

        let origin = *self.origin.get_or_insert(frame.timestamp);
        let stream_id = self.stream_id;
        let track = self.track(frame.kind);

        let mut timestamp = frame.timestamp.saturating_sub(origin);
        if let Some(last) = track.last_timestamp {
            if timestamp < last {
                tracing::warn!(
                    kind = frame.kind.name(),
                    timestamp = timestamp,
                    previous = last,
                    "Out-of-order frame timestamp, clamping"
                );
                timestamp = last;
            }
        }
        track.last_timestamp = Some(timestamp);

        Ok(frame_message(frame, timestamp, stream_id))
    }
}

fn header_message(header: &SequenceHeader, timestamp: u32, stream_id: u32) -> Message {
    match header.codec {
        Codec::H264 => Message::new(
            MSG_VIDEO,
            timestamp,
            stream_id,
            avc_payload(true, AvcPacketType::SequenceHeader, 0, &header.data),
        ),
        Codec::H265 => Message::new(
            MSG_VIDEO,
            timestamp,
            stream_id,
            ex_video_payload(true, VideoPacketType::SequenceStart, HEVC_FOURCC, 0, &header.data),
        ),
        Codec::Aac => Message::new(
            MSG_AUDIO,
            timestamp,
            stream_id,
            aac_payload(AacPacketType::SequenceHeader, &header.data),
        ),
    }
}

fn frame_message(frame: &MediaFrame, timestamp: u32, stream_id: u32) -> Message {
    match frame.codec {
        Codec::H264 => Message::new(
            MSG_VIDEO,
            timestamp,
            stream_id,
            avc_payload(
                frame.keyframe,
                AvcPacketType::Nalu,
                frame.composition_time,
                &frame.data,
            ),
        ),
        Codec::H265 => Message::new(
            MSG_VIDEO,
            timestamp,
            stream_id,
            ex_video_payload(
                frame.keyframe,
                VideoPacketType::CodedFrames,
                HEVC_FOURCC,
                frame.composition_time,
                &frame.data,
            ),
        ),
        Codec::Aac => Message::new(
            MSG_AUDIO,
            timestamp,
            stream_id,
            aac_payload(AacPacketType::Raw, &frame.data),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn avc_header(level: u8) -> SequenceHeader {
        SequenceHeader::from_parameter_sets(
            Bytes::from(vec![0x67, 0x42, 0x00, level]),
            Bytes::from_static(&[0x68, 0xCE]),
        )
        .unwrap()
    }

    fn video(ts: u32) -> MediaFrame {
        MediaFrame::h264(ts, ts == 0, Bytes::from_static(&[0, 0, 0, 1, 0x65]))
    }

    #[test]
    fn test_frame_without_header_refused() {
        let mut p = Packetizer::new(1);
        let err = p.push_frame(&video(0)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Media(MediaError::MissingSequenceHeader)
        ));
    }

    #[test]
    fn test_header_then_frames() {
        let mut p = Packetizer::new(1);
        let header = p.push_sequence_header(avc_header(31)).unwrap();
        assert_eq!(header.type_id, MSG_VIDEO);
        assert_eq!(&header.payload[..2], &[0x17, 0x00]);

        let msg = p.push_frame(&video(1000)).unwrap();
        assert_eq!(msg.timestamp, 0);
        assert_eq!(msg.stream_id, 1);
        assert_eq!(&msg.payload[..2], &[0x27, 0x01]);

        let msg = p.push_frame(&video(1033)).unwrap();
        assert_eq!(msg.timestamp, 33);
    }

    #[test]
    fn test_duplicate_header_not_resent_but_change_is() {
        let mut p = Packetizer::new(1);
        assert!(p.push_sequence_header(avc_header(31)).is_some());
        assert!(p.push_sequence_header(avc_header(31)).is_none());
        p.push_frame(&video(0)).unwrap();
        p.push_frame(&video(40)).unwrap();

        let changed = p.push_sequence_header(avc_header(40)).unwrap();
        assert_eq!(changed.timestamp, 40);
    }

    #[test]
    fn test_frame_of_other_codec_refused() {
        let mut p = Packetizer::new(1);
        p.push_sequence_header(avc_header(31));
        let h265 = MediaFrame::h265(0, true, Bytes::from_static(&[0, 0, 0, 1, 0x26]));
        let err = p.push_frame(&h265).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Media(MediaError::MissingSequenceHeader)
        ));
    }

    #[test]
    fn test_h265_uses_enhanced_header() {
        let mut p = Packetizer::new(1);
        let header = SequenceHeader::from_hevc_parameter_sets(
            Bytes::from_static(&[0x40, 0x01, 0x0C]),
            Bytes::from_static(&[
                0x42, 0x01, 0x01, 0x01, 0x60, 0x00, 0x00, 0x00, 0x90, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x5D,
            ]),
            Bytes::from_static(&[0x44, 0x01, 0xC1]),
        )
        .unwrap();
        let start = p.push_sequence_header(header.clone()).unwrap();
        assert_eq!(start.type_id, MSG_VIDEO);
        assert_eq!(&start.payload[..5], b"\x90hvc1");
        assert_eq!(&start.payload[5..], &header.data[..]);

        let key = MediaFrame::h265(0, true, Bytes::from_static(&[0, 0, 0, 1, 0x26]))
            .with_composition_time(66);
        let msg = p.push_frame(&key).unwrap();
        assert_eq!(&msg.payload[..8], &[0x91, b'h', b'v', b'c', b'1', 0x00, 0x00, 0x42]);
        assert_eq!(&msg.payload[8..], &[0, 0, 0, 1, 0x26]);

        let inter = MediaFrame::h265(33, false, Bytes::from_static(&[0, 0, 0, 1, 0x02]));
        let msg = p.push_frame(&inter).unwrap();
        assert_eq!(msg.timestamp, 33);
        assert_eq!(msg.payload[0], 0xA3);
        assert_eq!(&msg.payload[5..], &[0, 0, 0, 1, 0x02]);
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let mut p = Packetizer::new(1);
        p.push_sequence_header(avc_header(31));
        p.push_frame(&video(100)).unwrap();
        p.push_frame(&video(200)).unwrap();
        let msg = p.push_frame(&video(150)).unwrap();
        assert_eq!(msg.timestamp, 100);
    }

    #[test]
    fn test_audio_and_video_share_origin() {
        let mut p = Packetizer::new(1);
        p.push_sequence_header(avc_header(31));
        let asc = crate::media::aac::AudioSpecificConfig::new(2, 44100, 2).unwrap();
        let audio_header = p.push_sequence_header(SequenceHeader::aac(&asc)).unwrap();
        assert_eq!(&audio_header.payload[..], &[0xAF, 0x00, 0x12, 0x10]);

        p.push_frame(&video(5000)).unwrap();
        let msg = p.push_frame(&MediaFrame::aac(5023, Bytes::from_static(&[0x21]))).unwrap();
        assert_eq!(msg.type_id, MSG_AUDIO);
        assert_eq!(msg.timestamp, 23);
    }
}
