//! AMF (Action Message Format)
//!
//! AMF0 is the encoding RTMP uses for command messages (`connect`,
//! `createStream`, `publish`, `play`, ...) and data messages
//! (`@setDataFrame`, `onMetaData`). AMF3 is not used by this client.

pub mod amf0;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use value::{AmfObject, AmfValue};
