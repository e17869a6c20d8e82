//! Media handling for RTMP
//!
//! - FLV tag header bytes
//! - H.264/AVC and AAC payloads and codec configuration
//! - Enhanced RTMP video header and H.265/HEVC configuration
//! - Publish-side packetizer and play-side depacketizer
//! - Bounded outbound media queue

pub mod aac;
pub mod depacketizer;
pub mod enhanced;
pub mod flv;
pub mod frame;
pub mod h264;
pub mod hevc;
pub mod packetizer;
pub mod queue;

pub use aac::{AacPacketType, AacProfile, AudioSpecificConfig};
pub use depacketizer::{Depacketized, Depacketizer};
pub use frame::{Codec, CodecConfig, MediaFrame, MediaKind, SequenceHeader};
pub use enhanced::{ExVideoPacket, VideoPacketType, HEVC_FOURCC};
pub use h264::{AvcConfig, AvcPacketType};
pub use hevc::HevcConfig;
pub use packetizer::Packetizer;
pub use queue::{MediaQueue, OutboundMedia, PushOutcome};
