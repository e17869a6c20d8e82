//! RTMP chunk stream codec
//!
//! ```text
//! +--------------+------------------+--------------------+------------+
//! | Basic Header | Message Header   | Extended Timestamp | Chunk Data |
//! | (1-3 bytes)  | (0, 3, 7, 11)    | (0 or 4 bytes)     |            |
//! +--------------+------------------+--------------------+------------+
//!
//! Basic header:
//! - 1 byte:  fmt(2) + csid(6)            csid 2-63
//! - 2 bytes: fmt(2) + 0 + (csid - 64)    csid 64-319
//! - 3 bytes: fmt(2) + 1 + (csid - 64) LE csid 64-65599
//!
//! Message header by fmt:
//! - 0 (11 bytes): timestamp(3) length(3) type(1) stream_id(4, LE)
//! - 1 (7 bytes):  delta(3) length(3) type(1)
//! - 2 (3 bytes):  delta(3)
//! - 3 (0 bytes):  everything from the previous chunk on this csid
//! ```
//!
//! A 3-byte timestamp of 0xFFFFFF means the real value follows as a 4-byte
//! extended timestamp. Continuation chunks repeat the extended field when
//! the message's first chunk carried one.
//!
//! After a fmt 0 header the stored delta is the absolute timestamp, so a
//! following fmt 3 message advances by that amount. Encoder and decoder
//! share this rule.
//!
//! Reference: RTMP Specification Section 5.3

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

use crate::error::{FramingError, Result};
use crate::protocol::constants::*;

/// A complete RTMP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type id (see `MSG_*` constants)
    pub type_id: u8,
    /// Absolute timestamp in milliseconds
    pub timestamp: u32,
    /// Message stream id (0 for NetConnection traffic)
    pub stream_id: u32,
    pub payload: Bytes,
}

impl Message {
    pub fn new(type_id: u8, timestamp: u32, stream_id: u32, payload: Bytes) -> Self {
        Self {
            type_id,
            timestamp,
            stream_id,
            payload,
        }
    }

    pub fn is_media(&self) -> bool {
        self.type_id == MSG_AUDIO || self.type_id == MSG_VIDEO
    }
}

/// Last header seen on one chunk stream, per direction
#[derive(Debug, Clone, Copy, Default)]
struct ChunkStreamContext {
    timestamp: u32,
    timestamp_delta: u32,
    message_length: u32,
    message_type: u8,
    stream_id: u32,
    extended: bool,
}

#[derive(Debug, Default)]
struct InboundStream {
    context: Option<ChunkStreamContext>,
    partial: BytesMut,
    in_progress: bool,
}

/// Result of looking at the head of the input for one chunk
enum ChunkStep {
    NeedMore,
    Chunk {
        consumed: usize,
        message: Option<Message>,
    },
}

/// Chunk stream decoder
///
/// Demultiplexes chunks by csid and reassembles messages. Input that does not
/// yet contain a whole chunk is left untouched, so callers may feed bytes in
/// arbitrarily small pieces.
pub struct ChunkDecoder {
    chunk_size: u32,
    max_message_size: u32,
    streams: HashMap<u32, InboundStream>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            streams: HashMap::new(),
        }
    }

    /// Change the inbound chunk size (peer sent SetChunkSize)
    pub fn set_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(FramingError::InvalidChunkSize(size).into());
        }
        self.chunk_size = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Drop the partial message on `csid` (peer sent Abort)
    pub fn abort(&mut self, csid: u32) {
        if let Some(stream) = self.streams.get_mut(&csid) {
            stream.partial.clear();
            stream.in_progress = false;
        }
    }

    /// Consume whole chunks from `buf` until one message completes
    ///
    /// Returns `Ok(None)` when more bytes are needed; any trailing partial
    /// chunk stays in `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>> {
        let (message, consumed) = self.decode_slice(buf)?;
        buf.advance(consumed);
        Ok(message)
    }

    /// Slice form of [`decode`](Self::decode): returns the completed message
    /// (if any) and how many bytes of `input` were consumed
    pub fn decode_slice(&mut self, input: &[u8]) -> Result<(Option<Message>, usize)> {
        let mut offset = 0;
        loop {
            match self.decode_chunk(&input[offset..])? {
                ChunkStep::NeedMore => return Ok((None, offset)),
                ChunkStep::Chunk { consumed, message } => {
                    offset += consumed;
                    if message.is_some() {
                        return Ok((message, offset));
                    }
                }
            }
        }
    }

    /// Decode every complete message in `input`
    ///
    /// SetChunkSize messages are applied as soon as they complete, so chunks
    /// after them in the same input are split at the new size.
    pub fn decode_all(&mut self, input: &[u8]) -> Result<(Vec<Message>, usize)> {
        let mut messages = Vec::new();
        let mut offset = 0;
        loop {
            let (message, consumed) = self.decode_slice(&input[offset..])?;
            offset += consumed;
            match message {
                Some(msg) => {
                    if msg.type_id == MSG_SET_CHUNK_SIZE && msg.payload.len() >= 4 {
                        let size = u32::from_be_bytes([
                            msg.payload[0],
                            msg.payload[1],
                            msg.payload[2],
                            msg.payload[3],
                        ]) & MAX_CHUNK_SIZE;
                        self.set_chunk_size(size)?;
                    }
                    messages.push(msg);
                }
                None => return Ok((messages, offset)),
            }
        }
    }

    fn decode_chunk(&mut self, input: &[u8]) -> Result<ChunkStep> {
        let (fmt, csid, basic_len) = match parse_basic_header(input) {
            Some(v) => v,
            None => return Ok(ChunkStep::NeedMore),
        };

        let stream = self.streams.entry(csid).or_default();
        let previous = match (fmt, stream.context) {
            (CHUNK_FMT_0, ctx) => ctx.unwrap_or_default(),
            (_, Some(ctx)) => ctx,
            (_, None) => return Err(FramingError::MissingContext { csid, fmt }.into()),
        };
        if stream.in_progress && fmt != CHUNK_FMT_3 {
            return Err(FramingError::InterruptedMessage { csid, fmt }.into());
        }

        let header_len = match fmt {
            CHUNK_FMT_0 => 11,
            CHUNK_FMT_1 => 7,
            CHUNK_FMT_2 => 3,
            _ => 0,
        };
        let mut pos = basic_len;
        if input.len() < pos + header_len {
            return Ok(ChunkStep::NeedMore);
        }

        let mut header = &input[pos..pos + header_len];
        pos += header_len;

        let timestamp_field = if fmt == CHUNK_FMT_3 {
            None
        } else {
            Some(header.get_uint(3) as u32)
        };
        let (length, type_id) = if fmt == CHUNK_FMT_0 || fmt == CHUNK_FMT_1 {
            (header.get_uint(3) as u32, header.get_u8())
        } else {
            (previous.message_length, previous.message_type)
        };
        let stream_id = if fmt == CHUNK_FMT_0 {
            header.get_u32_le()
        } else {
            previous.stream_id
        };

        let extended = match timestamp_field {
            Some(field) => field == EXTENDED_TIMESTAMP,
            None => previous.extended,
        };
        let extended_value = if extended {
            if input.len() < pos + 4 {
                return Ok(ChunkStep::NeedMore);
            }
            let mut ext = &input[pos..pos + 4];
            pos += 4;
            Some(ext.get_u32())
        } else {
            None
        };

        let starting = !stream.in_progress;
        let context = if starting {
            let raw = extended_value.or(timestamp_field);
            let (timestamp, delta) = match fmt {
                CHUNK_FMT_0 => {
                    let ts = raw.unwrap_or(0);
                    (ts, ts)
                }
                _ => {
                    let delta = raw.unwrap_or(previous.timestamp_delta);
                    (previous.timestamp.wrapping_add(delta), delta)
                }
            };
            ChunkStreamContext {
                timestamp,
                timestamp_delta: delta,
                message_length: length,
                message_type: type_id,
                stream_id,
                extended,
            }
        } else {
            previous
        };

        if context.message_length > self.max_message_size {
            return Err(FramingError::MessageTooLarge {
                size: context.message_length,
                max: self.max_message_size,
            }
            .into());
        }

        let have = if starting { 0 } else { stream.partial.len() as u32 };
        let data_len = (context.message_length - have).min(self.chunk_size) as usize;
        if input.len() < pos + data_len {
            return Ok(ChunkStep::NeedMore);
        }

        // Whole chunk available: commit
        stream.context = Some(context);
        if starting {
            stream.partial.clear();
            stream.partial.reserve(context.message_length as usize);
            stream.in_progress = true;
        }
        stream.partial.put_slice(&input[pos..pos + data_len]);
        pos += data_len;

        let message = if stream.partial.len() as u32 >= context.message_length {
            stream.in_progress = false;
            let payload = stream.partial.split().freeze();
            tracing::trace!(
                csid = csid,
                type_id = context.message_type,
                size = payload.len(),
                timestamp = context.timestamp,
                "Message reassembled"
            );
            Some(Message {
                type_id: context.message_type,
                timestamp: context.timestamp,
                stream_id: context.stream_id,
                payload,
            })
        } else {
            None
        };

        Ok(ChunkStep::Chunk {
            consumed: pos,
            message,
        })
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the basic header: (fmt, csid, header length)
fn parse_basic_header(input: &[u8]) -> Option<(u8, u32, usize)> {
    let first = *input.first()?;
    let fmt = first >> 6;
    match first & 0x3F {
        0 => {
            let b1 = *input.get(1)?;
            Some((fmt, 64 + b1 as u32, 2))
        }
        1 => {
            let b1 = *input.get(1)?;
            let b2 = *input.get(2)?;
            Some((fmt, 64 + b1 as u32 + (b2 as u32) * 256, 3))
        }
        csid => Some((fmt, csid as u32, 1)),
    }
}

/// Chunk stream encoder
///
/// Splits messages into chunks of the current outbound chunk size and picks
/// the most compact header each csid's context allows.
pub struct ChunkEncoder {
    chunk_size: u32,
    streams: HashMap<u32, ChunkStreamContext>,
}

impl ChunkEncoder {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
        }
    }

    /// Change the outbound chunk size; applies from the next encoded message
    pub fn set_chunk_size(&mut self, size: u32) -> Result<()> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(FramingError::InvalidChunkSize(size).into());
        }
        self.chunk_size = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Encode `message` on chunk stream `csid`
    pub fn encode(&mut self, message: &Message, csid: u32) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(message.payload.len() + 18);
        self.encode_into(message, csid, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Encode `message` on chunk stream `csid`, appending to `buf`
    pub fn encode_into(&mut self, message: &Message, csid: u32, buf: &mut BytesMut) -> Result<()> {
        if !(2..=MAX_CSID).contains(&csid) {
            return Err(FramingError::InvalidChunkStreamId(csid).into());
        }
        let length = message.payload.len() as u32;
        if length > MAX_MESSAGE_SIZE {
            return Err(FramingError::MessageTooLarge {
                size: length,
                max: MAX_MESSAGE_SIZE,
            }
            .into());
        }

        let previous = self.streams.get(&csid).copied();
        let fmt = select_format(message, previous.as_ref());

        let (timestamp, delta) = match (fmt, previous) {
            (CHUNK_FMT_0, _) | (_, None) => (message.timestamp, message.timestamp),
            (_, Some(prev)) => (
                message.timestamp,
                message.timestamp.wrapping_sub(prev.timestamp),
            ),
        };
        let header_value = if fmt == CHUNK_FMT_0 { timestamp } else { delta };
        let extended = header_value >= EXTENDED_TIMESTAMP;
        let field = header_value.min(EXTENDED_TIMESTAMP);

        self.streams.insert(
            csid,
            ChunkStreamContext {
                timestamp,
                timestamp_delta: delta,
                message_length: length,
                message_type: message.type_id,
                stream_id: message.stream_id,
                extended,
            },
        );

        let chunk_size = self.chunk_size as usize;
        let payload = &message.payload[..];
        let mut offset = 0;
        loop {
            let first = offset == 0;
            write_basic_header(csid, if first { fmt } else { CHUNK_FMT_3 }, buf);
            if first {
                match fmt {
                    CHUNK_FMT_0 => {
                        put_u24(field, buf);
                        put_u24(length, buf);
                        buf.put_u8(message.type_id);
                        buf.put_u32_le(message.stream_id);
                    }
                    CHUNK_FMT_1 => {
                        put_u24(field, buf);
                        put_u24(length, buf);
                        buf.put_u8(message.type_id);
                    }
                    CHUNK_FMT_2 => put_u24(field, buf),
                    _ => {}
                }
            }
            if extended {
                buf.put_u32(header_value);
            }

            let end = (offset + chunk_size).min(payload.len());
            buf.put_slice(&payload[offset..end]);
            offset = end;
            if offset >= payload.len() {
                break;
            }
        }

        Ok(())
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the most compact header whose omitted fields match the context
fn select_format(message: &Message, previous: Option<&ChunkStreamContext>) -> u8 {
    let prev = match previous {
        Some(p) if p.stream_id == message.stream_id => p,
        _ => return CHUNK_FMT_0,
    };

    if prev.message_type != message.type_id || prev.message_length != message.payload.len() as u32 {
        return CHUNK_FMT_1;
    }

    if message.timestamp.wrapping_sub(prev.timestamp) == prev.timestamp_delta {
        CHUNK_FMT_3
    } else {
        CHUNK_FMT_2
    }
}

fn write_basic_header(csid: u32, fmt: u8, buf: &mut BytesMut) {
    if csid >= 320 {
        let rel = csid - 64;
        buf.put_u8((fmt << 6) | 1);
        buf.put_u8((rel & 0xFF) as u8);
        buf.put_u8((rel >> 8) as u8);
    } else if csid >= 64 {
        buf.put_u8(fmt << 6);
        buf.put_u8((csid - 64) as u8);
    } else {
        buf.put_u8((fmt << 6) | csid as u8);
    }
}

fn put_u24(value: u32, buf: &mut BytesMut) {
    buf.put_uint(value as u64, 3);
}
