//! Enhanced RTMP video payloads
//!
//! Codecs beyond H.264 are signaled with a FourCC instead of a 4-bit codec
//! ID. The top bit of the first byte (`isExVideoHeader`) marks the format:
//!
//! ```text
//! +-----------+-----------+------------+--------+----------------------+------+
//! | IsExHdr(1)| Frame(3)  | PktType(4) | FourCC | CompositionTime SI24 | Data |
//! |           |           |            | (4)    | (CodedFrames only)   |      |
//! +-----------+-----------+------------+--------+----------------------+------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MediaError, Result};
use crate::media::flv::VideoFrameType;

/// FourCC for H.265/HEVC
pub const HEVC_FOURCC: [u8; 4] = *b"hvc1";

const EX_HEADER_BIT: u8 = 0x80;

/// Enhanced video packet type (low 4 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPacketType {
    /// Decoder configuration record
    SequenceStart = 0,
    /// Frames with a composition time offset
    CodedFrames = 1,
    SequenceEnd = 2,
    /// Frames with composition time 0, offset omitted
    CodedFramesX = 3,
    Metadata = 4,
    Mpeg2TsSequenceStart = 5,
    Multitrack = 6,
    ModEx = 7,
}

impl VideoPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x0F {
            0 => Some(VideoPacketType::SequenceStart),
            1 => Some(VideoPacketType::CodedFrames),
            2 => Some(VideoPacketType::SequenceEnd),
            3 => Some(VideoPacketType::CodedFramesX),
            4 => Some(VideoPacketType::Metadata),
            5 => Some(VideoPacketType::Mpeg2TsSequenceStart),
            6 => Some(VideoPacketType::Multitrack),
            7 => Some(VideoPacketType::ModEx),
            _ => None,
        }
    }

    fn has_fourcc(&self) -> bool {
        matches!(
            self,
            VideoPacketType::SequenceStart
                | VideoPacketType::CodedFrames
                | VideoPacketType::SequenceEnd
                | VideoPacketType::CodedFramesX
        )
    }
}

/// Whether a video payload uses the extended header
#[inline]
pub fn is_enhanced(first_byte: u8) -> bool {
    first_byte & EX_HEADER_BIT != 0
}

/// Single-track enhanced video packet
#[derive(Debug, Clone)]
pub struct ExVideoPacket {
    pub frame_type: Option<VideoFrameType>,
    pub packet_type: VideoPacketType,
    pub fourcc: [u8; 4],
    pub composition_time: i32,
    pub body: Bytes,
}

impl ExVideoPacket {
    /// Parse a whole video message body, starting at the header byte
    ///
    /// Multitrack, ModEx and metadata packets carry no plain FourCC and are
    /// refused with [`MediaError::UnsupportedCodec`].
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.is_empty() || !is_enhanced(data[0]) {
            return Err(MediaError::InvalidHevcPacket.into());
        }
        let first = data.get_u8();
        let frame_type = VideoFrameType::from_byte(first & !EX_HEADER_BIT);
        let packet_type = VideoPacketType::from_byte(first).ok_or(MediaError::InvalidHevcPacket)?;
        if !packet_type.has_fourcc() {
            return Err(MediaError::UnsupportedCodec(format!("{:?} video packet", packet_type)).into());
        }

        if data.len() < 4 {
            return Err(MediaError::InvalidHevcPacket.into());
        }
        let mut fourcc = [0u8; 4];
        data.copy_to_slice(&mut fourcc);

        let composition_time = if packet_type == VideoPacketType::CodedFrames {
            if data.len() < 3 {
                return Err(MediaError::InvalidHevcPacket.into());
            }
            read_si24(&mut data)
        } else {
            0
        };

        Ok(ExVideoPacket {
            frame_type,
            packet_type,
            fourcc,
            composition_time,
            body: data,
        })
    }

    pub fn fourcc_str(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).into_owned()
    }
}

fn read_si24(data: &mut Bytes) -> i32 {
    let raw = data.get_uint(3) as i32;
    (raw << 8) >> 8
}

/// Build an enhanced RTMP video payload
///
/// `CodedFrames` with a zero composition time goes out as `CodedFramesX`.
pub fn ex_video_payload(
    keyframe: bool,
    packet_type: VideoPacketType,
    fourcc: [u8; 4],
    composition_time: i32,
    body: &[u8],
) -> Bytes {
    let frame_type = if keyframe {
        VideoFrameType::Keyframe
    } else {
        VideoFrameType::InterFrame
    };
    let packet_type = match packet_type {
        VideoPacketType::CodedFrames if composition_time == 0 => VideoPacketType::CodedFramesX,
        other => other,
    };

    let mut buf = BytesMut::with_capacity(8 + body.len());
    buf.put_u8(EX_HEADER_BIT | ((frame_type as u8) << 4) | packet_type as u8);
    buf.put_slice(&fourcc);
    if packet_type == VideoPacketType::CodedFrames {
        buf.put_uint((composition_time as u32 & 0xFF_FFFF) as u64, 3);
    }
    buf.put_slice(body);
    buf.freeze()
}
