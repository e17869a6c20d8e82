//! Inbound demultiplexing
//!
//! Buffers socket reads, reassembles messages, and applies the chunk-level
//! control messages (SetChunkSize, Abort) before handing them up.

use bytes::BytesMut;

use crate::error::Result;
use crate::mux::ack::AckTracker;
use crate::protocol::chunk::{ChunkDecoder, Message};
use crate::protocol::constants::*;
use crate::protocol::message::RtmpMessage;

/// Inbound side of the mux
pub struct Demuxer {
    decoder: ChunkDecoder,
    buffer: BytesMut,
    acks: AckTracker,
}

impl Demuxer {
    pub fn new() -> Self {
        Self {
            decoder: ChunkDecoder::new(),
            buffer: BytesMut::with_capacity(64 * 1024),
            acks: AckTracker::new(DEFAULT_WINDOW_ACK_SIZE),
        }
    }

    /// Read buffer for the socket
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Account for `n` bytes just read into [`buffer_mut`](Self::buffer_mut)
    ///
    /// Returns an Acknowledgement to send when the window is crossed.
    pub fn on_read(&mut self, n: usize) -> Option<Message> {
        self.acks
            .on_bytes(n)
            .map(|sequence| RtmpMessage::Acknowledgement { sequence }.into_message(0, 0))
    }

    /// Next complete message, if the buffer holds one
    ///
    /// SetChunkSize and Abort are applied here and still returned.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        let message = match self.decoder.decode(&mut self.buffer)? {
            Some(m) => m,
            None => return Ok(None),
        };

        match message.type_id {
            MSG_SET_CHUNK_SIZE | MSG_ABORT => match RtmpMessage::from_message(&message)? {
                RtmpMessage::SetChunkSize(size) => {
                    tracing::debug!(size = size, "Peer set chunk size");
                    self.decoder.set_chunk_size(size)?;
                }
                RtmpMessage::Abort { csid } => {
                    tracing::debug!(csid = csid, "Peer aborted message");
                    self.decoder.abort(csid);
                }
                _ => {}
            },
            MSG_WINDOW_ACK_SIZE => {
                if let Ok(RtmpMessage::WindowAckSize(window)) = RtmpMessage::from_message(&message) {
                    tracing::debug!(window = window, "Peer set window ack size");
                    self.acks.set_window(window);
                }
            }
            _ => {}
        }

        Ok(Some(message))
    }

    pub fn chunk_size(&self) -> u32 {
        self.decoder.chunk_size()
    }

    pub fn window(&self) -> u32 {
        self.acks.window()
    }

    pub fn bytes_received(&self) -> u64 {
        self.acks.total_received()
    }
}

impl Default for Demuxer {
    fn default() -> Self {
        Self::new()
    }
}
