//! H.264/AVC in RTMP video messages
//!
//! RTMP transports H.264 in AVCC format (length-prefixed NAL units).
//!
//! ```text
//! +----------+----------+---------------+-----------------+------+
//! |FrameType | CodecID  | AVCPacketType | CompositionTime | Data |
//! | (4 bits) | (4 bits) | (1 byte)      | (3 bytes, SI24) |      |
//! +----------+----------+---------------+-----------------+------+
//! ```
//!
//! AVCDecoderConfigurationRecord (sequence header):
//! ```text
//! configurationVersion (1) | AVCProfileIndication (1) | profile_compatibility (1)
//! | AVCLevelIndication (1) | lengthSizeMinusOne (1, lower 2 bits)
//! | numOfSPS (1, lower 5 bits) | { spsLength (2) | spsNALUnit }*
//! | numOfPPS (1) | { ppsLength (2) | ppsNALUnit }*
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MediaError, Result};
use crate::media::flv::{VideoCodec, VideoFrameType};

/// AVC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    SequenceHeader = 0,
    Nalu = 1,
    EndOfSequence = 2,
}

impl AvcPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AvcPacketType::SequenceHeader),
            1 => Some(AvcPacketType::Nalu),
            2 => Some(AvcPacketType::EndOfSequence),
            _ => None,
        }
    }
}

const NALU_TYPE_SPS: u8 = 7;
const NALU_TYPE_PPS: u8 = 8;

/// AVC decoder configuration (from sequence header)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfig {
    /// 66=Baseline, 77=Main, 100=High, ...
    pub profile: u8,
    pub compatibility: u8,
    /// e.g. 31 = 3.1
    pub level: u8,
    /// Bytes per NAL unit length prefix (usually 4)
    pub nalu_length_size: u8,
    pub sps: Vec<Bytes>,
    pub pps: Vec<Bytes>,
}

impl AvcConfig {
    /// Parse an AVCDecoderConfigurationRecord
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 7 || data.get_u8() != 1 {
            return Err(MediaError::InvalidAvcPacket.into());
        }

        let profile = data.get_u8();
        let compatibility = data.get_u8();
        let level = data.get_u8();
        let nalu_length_size = (data.get_u8() & 0x03) + 1;

        let num_sps = (data.get_u8() & 0x1F) as usize;
        let sps = read_parameter_sets(&mut data, num_sps)?;

        if data.is_empty() {
            return Err(MediaError::InvalidAvcPacket.into());
        }
        let num_pps = data.get_u8() as usize;
        let pps = read_parameter_sets(&mut data, num_pps)?;

        Ok(AvcConfig {
            profile,
            compatibility,
            level,
            nalu_length_size,
            sps,
            pps,
        })
    }

    /// Configuration for one SPS and one PPS, with 4-byte length prefixes
    pub fn from_parameter_sets(sps: Bytes, pps: Bytes) -> Result<Self> {
        if sps.len() < 4 || sps[0] & 0x1F != NALU_TYPE_SPS {
            return Err(MediaError::InvalidAvcPacket.into());
        }
        if pps.is_empty() || pps[0] & 0x1F != NALU_TYPE_PPS {
            return Err(MediaError::InvalidAvcPacket.into());
        }

        Ok(AvcConfig {
            profile: sps[1],
            compatibility: sps[2],
            level: sps[3],
            nalu_length_size: 4,
            sps: vec![sps],
            pps: vec![pps],
        })
    }

    /// Serialize as an AVCDecoderConfigurationRecord
    pub fn to_record(&self) -> Bytes {
        let sets_len: usize = self.sps.iter().chain(&self.pps).map(|s| s.len() + 2).sum();
        let mut buf = BytesMut::with_capacity(7 + sets_len);
        buf.put_u8(1);
        buf.put_u8(self.profile);
        buf.put_u8(self.compatibility);
        buf.put_u8(self.level);
        buf.put_u8(0xFC | (self.nalu_length_size.saturating_sub(1) & 0x03));
        buf.put_u8(0xE0 | (self.sps.len() as u8 & 0x1F));
        for sps in &self.sps {
            buf.put_u16(sps.len() as u16);
            buf.put_slice(sps);
        }
        buf.put_u8(self.pps.len() as u8);
        for pps in &self.pps {
            buf.put_u16(pps.len() as u16);
            buf.put_slice(pps);
        }
        buf.freeze()
    }

    pub fn profile_name(&self) -> &'static str {
        match self.profile {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            244 => "High 4:4:4",
            _ => "Unknown",
        }
    }

    /// Level as "3.1"
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }
}

fn read_parameter_sets(data: &mut Bytes, count: usize) -> Result<Vec<Bytes>> {
    let mut sets = Vec::with_capacity(count);
    for _ in 0..count {
        if data.len() < 2 {
            return Err(MediaError::InvalidAvcPacket.into());
        }
        let len = data.get_u16() as usize;
        if data.len() < len {
            return Err(MediaError::InvalidAvcPacket.into());
        }
        sets.push(data.copy_to_bytes(len));
    }
    Ok(sets)
}

/// AVC packet body after the frame-type/codec byte
#[derive(Debug, Clone)]
pub struct AvcPacket {
    pub packet_type: AvcPacketType,
    pub composition_time: i32,
    pub body: Bytes,
}

impl AvcPacket {
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < 4 {
            return Err(MediaError::InvalidAvcPacket.into());
        }

        let packet_type =
            AvcPacketType::from_byte(data.get_u8()).ok_or(MediaError::InvalidAvcPacket)?;

        // Signed 24-bit
        let raw = data.get_uint(3) as i32;
        let composition_time = (raw << 8) >> 8;

        Ok(AvcPacket {
            packet_type,
            composition_time,
            body: data,
        })
    }
}

/// Build an RTMP video payload for H.264
pub fn avc_payload(
    keyframe: bool,
    packet_type: AvcPacketType,
    composition_time: i32,
    body: &[u8],
) -> Bytes {
    let frame_type = if keyframe {
        VideoFrameType::Keyframe
    } else {
        VideoFrameType::InterFrame
    };
    let mut buf = BytesMut::with_capacity(5 + body.len());
    buf.put_u8(((frame_type as u8) << 4) | VideoCodec::Avc as u8);
    buf.put_u8(packet_type as u8);
    buf.put_uint((composition_time as u32 & 0xFF_FFFF) as u64, 3);
    buf.put_slice(body);
    buf.freeze()
}
