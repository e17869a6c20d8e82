//! H.265/HEVC codec configuration
//!
//! HEVC travels over enhanced RTMP with FourCC `hvc1`. The sequence start
//! carries an HEVCDecoderConfigurationRecord:
//!
//! ```text
//! configurationVersion (1) | profile_space(2) tier(1) profile_idc(5)
//! | profile_compatibility_flags (4) | constraint_indicator_flags (6)
//! | level_idc (1) | min_spatial_segmentation (2) | parallelismType (1)
//! | chromaFormat (1) | bitDepthLumaMinus8 (1) | bitDepthChromaMinus8 (1)
//! | avgFrameRate (2) | constantFrameRate(2) numTemporalLayers(3)
//!   temporalIdNested(1) lengthSizeMinusOne(2)
//! | numOfArrays (1) | { completeness(1) reserved(1) NAL_unit_type(6)
//!   | numNalus (2) | { nalUnitLength (2) | nalUnit }* }*
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{MediaError, Result};

const NAL_VPS: u8 = 32;
const NAL_SPS: u8 = 33;
const NAL_PPS: u8 = 34;

const RECORD_HEADER_LEN: usize = 23;

/// NAL unit type from the two-byte HEVC NAL header
pub fn nal_type(nal: &[u8]) -> Option<u8> {
    nal.first().map(|b| (b >> 1) & 0x3F)
}

/// HEVC decoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcConfig {
    pub profile_space: u8,
    pub high_tier: bool,
    /// 1=Main, 2=Main 10, ...
    pub profile_idc: u8,
    pub compatibility_flags: u32,
    pub constraint_flags: [u8; 6],
    /// 30 x level, e.g. 93 = 3.1
    pub level_idc: u8,
    /// 1 = 4:2:0
    pub chroma_format: u8,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    /// Bytes per NAL unit length prefix (usually 4)
    pub nalu_length_size: u8,
    pub vps: Vec<Bytes>,
    pub sps: Vec<Bytes>,
    pub pps: Vec<Bytes>,
}

impl HevcConfig {
    /// Parse an HEVCDecoderConfigurationRecord
    ///
    /// Parameter set arrays other than VPS, SPS and PPS are skipped.
    pub fn parse(mut data: Bytes) -> Result<Self> {
        if data.len() < RECORD_HEADER_LEN || data.get_u8() != 1 {
            return Err(MediaError::InvalidHevcPacket.into());
        }

        let ptl = data.get_u8();
        let compatibility_flags = data.get_u32();
        let mut constraint_flags = [0u8; 6];
        data.copy_to_slice(&mut constraint_flags);
        let level_idc = data.get_u8();
        data.advance(3); // min_spatial_segmentation, parallelismType
        let chroma_format = data.get_u8() & 0x03;
        let bit_depth_luma = (data.get_u8() & 0x07) + 8;
        let bit_depth_chroma = (data.get_u8() & 0x07) + 8;
        data.advance(2); // avgFrameRate
        let layering = data.get_u8();
        let num_arrays = data.get_u8();

        let mut config = HevcConfig {
            profile_space: ptl >> 6,
            high_tier: ptl & 0x20 != 0,
            profile_idc: ptl & 0x1F,
            compatibility_flags,
            constraint_flags,
            level_idc,
            chroma_format,
            bit_depth_luma,
            bit_depth_chroma,
            num_temporal_layers: (layering >> 3) & 0x07,
            temporal_id_nested: layering & 0x04 != 0,
            nalu_length_size: (layering & 0x03) + 1,
            vps: Vec::new(),
            sps: Vec::new(),
            pps: Vec::new(),
        };

        for _ in 0..num_arrays {
            if data.len() < 3 {
                return Err(MediaError::InvalidHevcPacket.into());
            }
            let nal_type = data.get_u8() & 0x3F;
            let count = data.get_u16() as usize;
            let mut units = Vec::with_capacity(count);
            for _ in 0..count {
                if data.len() < 2 {
                    return Err(MediaError::InvalidHevcPacket.into());
                }
                let len = data.get_u16() as usize;
                if data.len() < len {
                    return Err(MediaError::InvalidHevcPacket.into());
                }
                units.push(data.copy_to_bytes(len));
            }
            match nal_type {
                NAL_VPS => config.vps.extend(units),
                NAL_SPS => config.sps.extend(units),
                NAL_PPS => config.pps.extend(units),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Configuration for one VPS, SPS and PPS, with 4-byte length prefixes
    ///
    /// Profile, tier and level come from the SPS; 8-bit 4:2:0 is assumed.
    pub fn from_parameter_sets(vps: Bytes, sps: Bytes, pps: Bytes) -> Result<Self> {
        if nal_type(&vps) != Some(NAL_VPS) || nal_type(&pps) != Some(NAL_PPS) {
            return Err(MediaError::InvalidHevcPacket.into());
        }
        if nal_type(&sps) != Some(NAL_SPS) {
            return Err(MediaError::InvalidHevcPacket.into());
        }

        // NAL header (2), sub-layer byte (1), general profile_tier_level (12)
        let rbsp = unescape(&sps, 15);
        if rbsp.len() < 15 {
            return Err(MediaError::InvalidHevcPacket.into());
        }
        let ptl = rbsp[3];
        let mut constraint_flags = [0u8; 6];
        constraint_flags.copy_from_slice(&rbsp[8..14]);

        Ok(HevcConfig {
            profile_space: ptl >> 6,
            high_tier: ptl & 0x20 != 0,
            profile_idc: ptl & 0x1F,
            compatibility_flags: u32::from_be_bytes([rbsp[4], rbsp[5], rbsp[6], rbsp[7]]),
            constraint_flags,
            level_idc: rbsp[14],
            chroma_format: 1,
            bit_depth_luma: 8,
            bit_depth_chroma: 8,
            num_temporal_layers: ((rbsp[2] >> 1) & 0x07) + 1,
            temporal_id_nested: rbsp[2] & 0x01 != 0,
            nalu_length_size: 4,
            vps: vec![vps],
            sps: vec![sps],
            pps: vec![pps],
        })
    }

    /// Serialize as an HEVCDecoderConfigurationRecord
    pub fn to_record(&self) -> Bytes {
        let sets_len: usize = self
            .vps
            .iter()
            .chain(&self.sps)
            .chain(&self.pps)
            .map(|s| s.len() + 2)
            .sum();
        let mut buf = BytesMut::with_capacity(RECORD_HEADER_LEN + 9 + sets_len);
        buf.put_u8(1);
        buf.put_u8((self.profile_space << 6) | ((self.high_tier as u8) << 5) | (self.profile_idc & 0x1F));
        buf.put_u32(self.compatibility_flags);
        buf.put_slice(&self.constraint_flags);
        buf.put_u8(self.level_idc);
        buf.put_u16(0xF000);
        buf.put_u8(0xFC);
        buf.put_u8(0xFC | (self.chroma_format & 0x03));
        buf.put_u8(0xF8 | (self.bit_depth_luma.saturating_sub(8) & 0x07));
        buf.put_u8(0xF8 | (self.bit_depth_chroma.saturating_sub(8) & 0x07));
        buf.put_u16(0);
        buf.put_u8(
            ((self.num_temporal_layers & 0x07) << 3)
                | ((self.temporal_id_nested as u8) << 2)
                | (self.nalu_length_size.saturating_sub(1) & 0x03),
        );

        let arrays = [(NAL_VPS, &self.vps), (NAL_SPS, &self.sps), (NAL_PPS, &self.pps)];
        buf.put_u8(arrays.iter().filter(|(_, units)| !units.is_empty()).count() as u8);
        for (nal_type, units) in arrays {
            if units.is_empty() {
                continue;
            }
            buf.put_u8(0x80 | nal_type);
            buf.put_u16(units.len() as u16);
            for unit in units {
                buf.put_u16(unit.len() as u16);
                buf.put_slice(unit);
            }
        }
        buf.freeze()
    }

    pub fn profile_name(&self) -> &'static str {
        match self.profile_idc {
            1 => "Main",
            2 => "Main 10",
            3 => "Main Still Picture",
            4 => "Range Extensions",
            _ => "Unknown",
        }
    }

    /// Level as "3.1"
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level_idc / 30, (self.level_idc % 30) / 3)
    }
}

/// Strip emulation prevention bytes from the first `limit` RBSP bytes
fn unescape(nal: &[u8], limit: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(limit);
    let mut zeros = 0;
    for &b in nal {
        if out.len() == limit {
            break;
        }
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        out.push(b);
        zeros = if b == 0 { zeros + 1 } else { 0 };
    }
    out
}
