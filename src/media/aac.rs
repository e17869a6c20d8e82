//! AAC in RTMP audio messages
//!
//! RTMP transports AAC raw (no ADTS headers). The first payload byte is
//! always 0xAF for AAC (format 10, 44 kHz, 16-bit, stereo flags; the real
//! parameters live in the AudioSpecificConfig).
//!
//! ```text
//! +-----------+----------+----------+----------+---------+---------+
//! |SoundFormat|SoundRate |SoundSize |SoundType | AACType | AACData |
//! | (4 bits)  | (2 bits) | (1 bit)  | (1 bit)  | (1 byte)|         |
//! +-----------+----------+----------+----------+---------+---------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MediaError, Result};

/// Tag byte for every AAC payload
pub const AAC_TAG_BYTE: u8 = 0xAF;

/// AAC packet type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    SequenceHeader = 0,
    Raw = 1,
}

impl AacPacketType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(AacPacketType::SequenceHeader),
            1 => Some(AacPacketType::Raw),
            _ => None,
        }
    }
}

/// AAC profile (audio object type)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    Main = 1,
    Lc = 2,
    Ssr = 3,
    Ltp = 4,
    /// HE-AAC
    Sbr = 5,
}

impl AacProfile {
    pub fn from_object_type(ot: u8) -> Option<Self> {
        match ot {
            1 => Some(AacProfile::Main),
            2 => Some(AacProfile::Lc),
            3 => Some(AacProfile::Ssr),
            4 => Some(AacProfile::Ltp),
            5 => Some(AacProfile::Sbr),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AacProfile::Main => "AAC Main",
            AacProfile::Lc => "AAC LC",
            AacProfile::Ssr => "AAC SSR",
            AacProfile::Ltp => "AAC LTP",
            AacProfile::Sbr => "HE-AAC",
        }
    }
}

const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// AudioSpecificConfig (from sequence header)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    pub sampling_frequency_index: u8,
    pub sampling_frequency: u32,
    /// 1=mono, 2=stereo, ...
    pub channel_configuration: u8,
    pub raw: Bytes,
}

impl AudioSpecificConfig {
    /// Two-byte config for a standard sample rate
    pub fn new(audio_object_type: u8, sampling_frequency: u32, channels: u8) -> Result<Self> {
        let index = SAMPLING_FREQUENCIES
            .iter()
            .position(|&f| f == sampling_frequency)
            .ok_or_else(|| MediaError::UnsupportedCodec(format!("AAC at {} Hz", sampling_frequency)))?
            as u8;
        if audio_object_type == 0 || audio_object_type > 31 || channels > 7 {
            return Err(MediaError::InvalidAacPacket.into());
        }

        let value: u16 = ((audio_object_type as u16) << 11)
            | ((index as u16) << 7)
            | ((channels as u16) << 3);
        let mut raw = BytesMut::with_capacity(2);
        raw.put_u16(value);

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index: index,
            sampling_frequency,
            channel_configuration: channels,
            raw: raw.freeze(),
        })
    }

    /// Parse from AAC sequence header data
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() < 2 {
            return Err(MediaError::InvalidAacPacket.into());
        }

        // audioObjectType(5) samplingFrequencyIndex(4) [frequency(24)] channelConfiguration(4)
        let b0 = data[0];
        let b1 = data[1];

        let audio_object_type = (b0 >> 3) & 0x1F;
        let sampling_frequency_index = ((b0 & 0x07) << 1) | ((b1 >> 7) & 0x01);

        let (sampling_frequency, channel_configuration) = if sampling_frequency_index == 0x0F {
            if data.len() < 5 {
                return Err(MediaError::InvalidAacPacket.into());
            }
            let mut bits = &data[1..5];
            let word = bits.get_u32();
            let frequency = (word >> 7) & 0xFF_FFFF;
            let channels = ((word >> 3) & 0x0F) as u8;
            (frequency, channels)
        } else {
            let frequency = *SAMPLING_FREQUENCIES
                .get(sampling_frequency_index as usize)
                .ok_or(MediaError::InvalidAacPacket)?;
            (frequency, (b1 >> 3) & 0x0F)
        };

        Ok(AudioSpecificConfig {
            audio_object_type,
            sampling_frequency_index,
            sampling_frequency,
            channel_configuration,
            raw: data,
        })
    }

    pub fn profile(&self) -> Option<AacProfile> {
        AacProfile::from_object_type(self.audio_object_type)
    }

    pub fn channels(&self) -> u8 {
        match self.channel_configuration {
            7 => 8,
            n => n,
        }
    }
}

/// AAC packet body after the tag byte
#[derive(Debug, Clone)]
pub struct AacPacket {
    pub packet_type: AacPacketType,
    pub body: Bytes,
}

impl AacPacket {
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.is_empty() {
            return Err(MediaError::InvalidAacPacket.into());
        }
        let packet_type =
            AacPacketType::from_byte(data.get_u8()).ok_or(MediaError::InvalidAacPacket)?;
        Ok(AacPacket {
            packet_type,
            body: data,
        })
    }
}

/// Build an RTMP audio payload for AAC
pub fn aac_payload(packet_type: AacPacketType, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + body.len());
    buf.put_u8(AAC_TAG_BYTE);
    buf.put_u8(packet_type as u8);
    buf.put_slice(body);
    buf.freeze()
}
