//! RTMP wire protocol
//!
//! Low-level protocol pieces with no I/O policy of their own:
//! - Handshake (C0C1/S0S1S2/C2 exchange)
//! - Chunk stream encoding and reassembly
//! - Message parsing and command construction

pub mod chunk;
pub mod constants;
pub mod handshake;
pub mod message;

pub use chunk::{ChunkDecoder, ChunkEncoder, Message};
pub use handshake::{perform_client_handshake, Handshake, HandshakeState};
pub use message::{Command, ConnectParams, DataMessage, RtmpMessage, UserControlEvent};
