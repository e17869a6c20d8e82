//! Outbound message multiplexing
//!
//! Assigns each message a chunk stream and frames it with the shared
//! [`ChunkEncoder`]. A SetChunkSize message switches the encoder only after
//! the message itself has been framed, so the new size starts with the next
//! message.

use bytes::BytesMut;

use crate::error::Result;
use crate::protocol::chunk::{ChunkEncoder, Message};
use crate::protocol::constants::*;
use crate::protocol::message::RtmpMessage;

/// Chunk stream for a message
///
/// Protocol control on 2, NetConnection commands on 3, NetStream commands and
/// data on 5, audio on 4, video on 6.
pub fn csid_for(message: &Message) -> u32 {
    match message.type_id {
        MSG_SET_CHUNK_SIZE
        | MSG_ABORT
        | MSG_ACKNOWLEDGEMENT
        | MSG_USER_CONTROL
        | MSG_WINDOW_ACK_SIZE
        | MSG_SET_PEER_BANDWIDTH => CSID_PROTOCOL_CONTROL,
        MSG_AUDIO => CSID_AUDIO,
        MSG_VIDEO => CSID_VIDEO,
        _ if message.stream_id == 0 => CSID_COMMAND,
        _ => CSID_STREAM_COMMAND,
    }
}

/// Outbound side of the mux
pub struct Muxer {
    encoder: ChunkEncoder,
    /// Size announced in the last SetChunkSize we produced
    announced_chunk_size: u32,
}

impl Muxer {
    pub fn new() -> Self {
        Self {
            encoder: ChunkEncoder::new(),
            announced_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Current outbound chunk size
    pub fn chunk_size(&self) -> u32 {
        self.encoder.chunk_size()
    }

    /// SetChunkSize message for `size`, or `None` if that size is already in
    /// effect or announced
    pub fn chunk_size_change(&mut self, size: u32) -> Option<Message> {
        if size == self.announced_chunk_size || size == 0 || size > MAX_CHUNK_SIZE {
            return None;
        }
        self.announced_chunk_size = size;
        Some(RtmpMessage::SetChunkSize(size).into_message(0, 0))
    }

    /// Frame `message` onto `buf`
    pub fn write(&mut self, message: &Message, buf: &mut BytesMut) -> Result<()> {
        self.encoder.encode_into(message, csid_for(message), buf)?;

        if message.type_id == MSG_SET_CHUNK_SIZE {
            if let Ok(RtmpMessage::SetChunkSize(size)) = RtmpMessage::from_message(message) {
                self.encoder.set_chunk_size(size)?;
                self.announced_chunk_size = size;
                tracing::debug!(size = size, "Outbound chunk size changed");
            }
        }
        Ok(())
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new()
    }
}
