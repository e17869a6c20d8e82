//! RTMP message types and parsing
//!
//! RTMP messages are classified into:
//! - Protocol Control Messages (types 1-6): Chunk/flow control
//! - Command Messages (type 20): AMF0-encoded commands
//! - Data Messages (type 18): Metadata
//! - Audio/Video Messages (types 8, 9): Media data
//!
//! Reference: RTMP Specification Section 5.4

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::amf::{Amf0Decoder, Amf0Encoder, AmfObject, AmfValue};
use crate::error::{AmfError, FramingError, Result};
use crate::protocol::chunk::Message;
use crate::protocol::constants::*;

/// Parsed RTMP message
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpMessage {
    /// Set Chunk Size (type 1)
    SetChunkSize(u32),

    /// Abort Message (type 2)
    Abort { csid: u32 },

    /// Acknowledgement (type 3)
    Acknowledgement { sequence: u32 },

    /// User Control Message (type 4)
    UserControl(UserControlEvent),

    /// Window Acknowledgement Size (type 5)
    WindowAckSize(u32),

    /// Set Peer Bandwidth (type 6)
    SetPeerBandwidth { size: u32, limit_type: u8 },

    /// Audio data (type 8)
    Audio { timestamp: u32, data: Bytes },

    /// Video data (type 9)
    Video { timestamp: u32, data: Bytes },

    /// AMF0 Command (type 20)
    Command(Command),

    /// AMF0 Data message (type 18)
    Data(DataMessage),

    /// Anything else (AMF3 variants, aggregates, shared objects)
    Unknown { type_id: u8, data: Bytes },
}

/// User Control Event
#[derive(Debug, Clone, PartialEq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest(u32),
    PingResponse(u32),
    Unknown { event_type: u16, data: Bytes },
}

/// RTMP command (connect, publish, play, _result, onStatus, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub transaction_id: f64,
    /// Command object (often null)
    pub command_object: AmfValue,
    pub arguments: Vec<AmfValue>,
    /// Message stream ID the command travels on
    pub stream_id: u32,
}

/// Data message (@setDataFrame, onMetaData, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    pub name: String,
    pub values: Vec<AmfValue>,
    pub stream_id: u32,
}

/// Properties of the `connect` command object
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    pub app: String,
    pub tc_url: String,
    pub flash_ver: String,
    pub swf_url: Option<String>,
    pub page_url: Option<String>,
    /// Enhanced RTMP video FourCCs offered to the server (empty for legacy)
    pub fourcc_list: Vec<String>,
}

impl ConnectParams {
    /// Build the command object in the order Flash clients send it
    pub fn to_amf(&self) -> AmfValue {
        let mut obj = AmfObject::new()
            .with("app", self.app.as_str())
            .with("type", "nonprivate")
            .with("flashVer", self.flash_ver.as_str());
        if let Some(swf) = &self.swf_url {
            obj.insert("swfUrl", swf.as_str());
        }
        obj.insert("tcUrl", self.tc_url.as_str());
        obj.insert("fpad", false);
        obj.insert("capabilities", 15.0);
        obj.insert("audioCodecs", 3191.0);
        obj.insert("videoCodecs", 252.0);
        obj.insert("videoFunction", 1.0);
        if let Some(page) = &self.page_url {
            obj.insert("pageUrl", page.as_str());
        }
        if !self.fourcc_list.is_empty() {
            let list = self.fourcc_list.iter().map(|f| AmfValue::from(f.as_str())).collect();
            obj.insert("fourCcList", AmfValue::Array(list));
        }
        obj.insert("objectEncoding", 0.0);
        AmfValue::Object(obj)
    }
}

impl RtmpMessage {
    /// Parse a reassembled message
    pub fn from_message(message: &Message) -> Result<Self> {
        let mut payload = message.payload.clone();

        match message.type_id {
            MSG_SET_CHUNK_SIZE => {
                let value = read_u32(&mut payload, MSG_SET_CHUNK_SIZE)?;
                Ok(RtmpMessage::SetChunkSize(value & MAX_CHUNK_SIZE))
            }

            MSG_ABORT => Ok(RtmpMessage::Abort {
                csid: read_u32(&mut payload, MSG_ABORT)?,
            }),

            MSG_ACKNOWLEDGEMENT => Ok(RtmpMessage::Acknowledgement {
                sequence: read_u32(&mut payload, MSG_ACKNOWLEDGEMENT)?,
            }),

            MSG_USER_CONTROL => Self::parse_user_control(&mut payload),

            MSG_WINDOW_ACK_SIZE => Ok(RtmpMessage::WindowAckSize(read_u32(
                &mut payload,
                MSG_WINDOW_ACK_SIZE,
            )?)),

            MSG_SET_PEER_BANDWIDTH => {
                let size = read_u32(&mut payload, MSG_SET_PEER_BANDWIDTH)?;
                // Limit type is sometimes omitted; treat as dynamic
                let limit_type = if payload.has_remaining() {
                    payload.get_u8()
                } else {
                    2
                };
                Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
            }

            MSG_AUDIO => Ok(RtmpMessage::Audio {
                timestamp: message.timestamp,
                data: payload,
            }),

            MSG_VIDEO => Ok(RtmpMessage::Video {
                timestamp: message.timestamp,
                data: payload,
            }),

            MSG_COMMAND_AMF0 => Ok(RtmpMessage::Command(Self::parse_command(
                &mut payload,
                message.stream_id,
            )?)),

            MSG_DATA_AMF0 => Ok(RtmpMessage::Data(Self::parse_data(
                &mut payload,
                message.stream_id,
            )?)),

            type_id => Ok(RtmpMessage::Unknown {
                type_id,
                data: payload,
            }),
        }
    }

    fn parse_user_control(payload: &mut Bytes) -> Result<Self> {
        if payload.len() < 6 {
            return Err(FramingError::TruncatedControl(MSG_USER_CONTROL).into());
        }

        let event_type = payload.get_u16();
        let event = match event_type {
            UC_STREAM_BEGIN => UserControlEvent::StreamBegin(payload.get_u32()),
            UC_STREAM_EOF => UserControlEvent::StreamEof(payload.get_u32()),
            UC_STREAM_DRY => UserControlEvent::StreamDry(payload.get_u32()),
            UC_SET_BUFFER_LENGTH => {
                if payload.len() < 8 {
                    return Err(FramingError::TruncatedControl(MSG_USER_CONTROL).into());
                }
                let stream_id = payload.get_u32();
                let buffer_ms = payload.get_u32();
                UserControlEvent::SetBufferLength {
                    stream_id,
                    buffer_ms,
                }
            }
            UC_STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded(payload.get_u32()),
            UC_PING_REQUEST => UserControlEvent::PingRequest(payload.get_u32()),
            UC_PING_RESPONSE => UserControlEvent::PingResponse(payload.get_u32()),
            _ => UserControlEvent::Unknown {
                event_type,
                data: payload.clone(),
            },
        };

        Ok(RtmpMessage::UserControl(event))
    }

    fn parse_command(payload: &mut Bytes, stream_id: u32) -> Result<Command> {
        let mut decoder = Amf0Decoder::new();

        let name = match decoder.decode(payload)? {
            AmfValue::String(s) => s,
            other => {
                return Err(FramingError::InvalidCommand(format!(
                    "expected command name, got {:?}",
                    other
                ))
                .into())
            }
        };

        let transaction_id = if payload.has_remaining() {
            decoder.decode(payload)?.as_number().unwrap_or(0.0)
        } else {
            0.0
        };

        let command_object = if payload.has_remaining() {
            decoder.decode(payload)?
        } else {
            AmfValue::Null
        };

        let arguments = decode_remaining(&mut decoder, payload)?;

        Ok(Command {
            name,
            transaction_id,
            command_object,
            arguments,
            stream_id,
        })
    }

    fn parse_data(payload: &mut Bytes, stream_id: u32) -> Result<DataMessage> {
        let mut decoder = Amf0Decoder::new();

        let name = match decoder.decode(payload)? {
            AmfValue::String(s) => s,
            _ => String::new(),
        };
        let values = decode_remaining(&mut decoder, payload)?;

        Ok(DataMessage {
            name,
            values,
            stream_id,
        })
    }

    /// Message type id and payload
    pub fn encode(&self) -> (u8, Bytes) {
        match self {
            RtmpMessage::SetChunkSize(size) => (MSG_SET_CHUNK_SIZE, u32_payload(*size)),
            RtmpMessage::Abort { csid } => (MSG_ABORT, u32_payload(*csid)),
            RtmpMessage::Acknowledgement { sequence } => {
                (MSG_ACKNOWLEDGEMENT, u32_payload(*sequence))
            }
            RtmpMessage::WindowAckSize(size) => (MSG_WINDOW_ACK_SIZE, u32_payload(*size)),

            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                let mut buf = BytesMut::with_capacity(5);
                buf.put_u32(*size);
                buf.put_u8(*limit_type);
                (MSG_SET_PEER_BANDWIDTH, buf.freeze())
            }

            RtmpMessage::UserControl(event) => {
                let mut buf = BytesMut::with_capacity(10);
                match event {
                    UserControlEvent::StreamBegin(id) => {
                        buf.put_u16(UC_STREAM_BEGIN);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::StreamEof(id) => {
                        buf.put_u16(UC_STREAM_EOF);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::StreamDry(id) => {
                        buf.put_u16(UC_STREAM_DRY);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::SetBufferLength {
                        stream_id,
                        buffer_ms,
                    } => {
                        buf.put_u16(UC_SET_BUFFER_LENGTH);
                        buf.put_u32(*stream_id);
                        buf.put_u32(*buffer_ms);
                    }
                    UserControlEvent::StreamIsRecorded(id) => {
                        buf.put_u16(UC_STREAM_IS_RECORDED);
                        buf.put_u32(*id);
                    }
                    UserControlEvent::PingRequest(ts) => {
                        buf.put_u16(UC_PING_REQUEST);
                        buf.put_u32(*ts);
                    }
                    UserControlEvent::PingResponse(ts) => {
                        buf.put_u16(UC_PING_RESPONSE);
                        buf.put_u32(*ts);
                    }
                    UserControlEvent::Unknown { event_type, data } => {
                        buf.put_u16(*event_type);
                        buf.put_slice(data);
                    }
                }
                (MSG_USER_CONTROL, buf.freeze())
            }

            RtmpMessage::Audio { data, .. } => (MSG_AUDIO, data.clone()),
            RtmpMessage::Video { data, .. } => (MSG_VIDEO, data.clone()),
            RtmpMessage::Command(cmd) => (MSG_COMMAND_AMF0, cmd.encode()),
            RtmpMessage::Data(data) => (MSG_DATA_AMF0, data.encode()),
            RtmpMessage::Unknown { type_id, data } => (*type_id, data.clone()),
        }
    }

    /// Wrap into a [`Message`] on `stream_id`
    pub fn into_message(self, timestamp: u32, stream_id: u32) -> Message {
        let (type_id, payload) = self.encode();
        Message::new(type_id, timestamp, stream_id, payload)
    }
}

fn read_u32(payload: &mut Bytes, type_id: u8) -> Result<u32> {
    if payload.len() < 4 {
        return Err(FramingError::TruncatedControl(type_id).into());
    }
    Ok(payload.get_u32())
}

fn u32_payload(value: u32) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

fn decode_remaining(decoder: &mut Amf0Decoder, payload: &mut Bytes) -> Result<Vec<AmfValue>> {
    let mut values = Vec::new();
    while payload.has_remaining() {
        match decoder.decode(payload) {
            Ok(v) => values.push(v),
            Err(AmfError::UnexpectedEof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(values)
}

impl Command {
    fn new(name: &str, transaction_id: f64, stream_id: u32, arguments: Vec<AmfValue>) -> Self {
        Command {
            name: name.to_string(),
            transaction_id,
            command_object: AmfValue::Null,
            arguments,
            stream_id,
        }
    }

    pub fn connect(transaction_id: f64, params: &ConnectParams) -> Self {
        Command {
            command_object: params.to_amf(),
            ..Command::new(CMD_CONNECT, transaction_id, 0, Vec::new())
        }
    }

    pub fn create_stream(transaction_id: f64) -> Self {
        Command::new(CMD_CREATE_STREAM, transaction_id, 0, Vec::new())
    }

    pub fn release_stream(transaction_id: f64, stream_name: &str) -> Self {
        Command::new(CMD_RELEASE_STREAM, transaction_id, 0, vec![stream_name.into()])
    }

    pub fn fc_publish(transaction_id: f64, stream_name: &str) -> Self {
        Command::new(CMD_FC_PUBLISH, transaction_id, 0, vec![stream_name.into()])
    }

    pub fn fc_unpublish(transaction_id: f64, stream_name: &str) -> Self {
        Command::new(CMD_FC_UNPUBLISH, transaction_id, 0, vec![stream_name.into()])
    }

    /// `publish(name, "live")` on the media stream
    pub fn publish(transaction_id: f64, stream_id: u32, stream_name: &str) -> Self {
        Command::new(
            CMD_PUBLISH,
            transaction_id,
            stream_id,
            vec![stream_name.into(), "live".into()],
        )
    }

    /// `play(name, -2, -1, true)`: live if available, else recorded, to the end
    pub fn play(transaction_id: f64, stream_id: u32, stream_name: &str) -> Self {
        Command::new(
            CMD_PLAY,
            transaction_id,
            stream_id,
            vec![
                stream_name.into(),
                AmfValue::Number(-2.0),
                AmfValue::Number(-1.0),
                AmfValue::Boolean(true),
            ],
        )
    }

    pub fn pause(transaction_id: f64, stream_id: u32, paused: bool, position_ms: u32) -> Self {
        Command::new(
            CMD_PAUSE,
            transaction_id,
            stream_id,
            vec![paused.into(), position_ms.into()],
        )
    }

    pub fn close_stream(stream_id: u32) -> Self {
        Command::new(CMD_CLOSE_STREAM, 0.0, stream_id, Vec::new())
    }

    pub fn delete_stream(transaction_id: f64, stream_id: u32) -> Self {
        Command::new(
            CMD_DELETE_STREAM,
            transaction_id,
            0,
            vec![stream_id.into()],
        )
    }

    /// First object argument: the info object of `_result`/`_error`/`onStatus`
    pub fn info(&self) -> Option<&AmfObject> {
        self.arguments.iter().find_map(|a| a.as_object())
    }

    /// `code` from the info object
    pub fn status_code(&self) -> Option<&str> {
        self.info()?.get("code")?.as_str()
    }

    /// `description` from the info object, falling back to the code
    pub fn description(&self) -> String {
        self.info()
            .and_then(|i| i.get("description").and_then(|d| d.as_str()))
            .or_else(|| self.status_code())
            .unwrap_or(&self.name)
            .to_string()
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&AmfValue::String(self.name.clone()));
        encoder.encode(&AmfValue::Number(self.transaction_id));
        encoder.encode(&self.command_object);
        encoder.encode_all(&self.arguments);
        encoder.finish()
    }

    pub fn into_message(self) -> Message {
        let stream_id = self.stream_id;
        RtmpMessage::Command(self).into_message(0, stream_id)
    }
}

impl DataMessage {
    /// `@setDataFrame("onMetaData", metadata)`
    pub fn set_data_frame(stream_id: u32, metadata: AmfObject) -> Self {
        DataMessage {
            name: CMD_SET_DATA_FRAME.to_string(),
            values: vec![CMD_ON_METADATA.into(), AmfValue::EcmaArray(metadata)],
            stream_id,
        }
    }

    /// Metadata carried by `onMetaData` or `@setDataFrame onMetaData`
    pub fn metadata(&self) -> Option<&AmfValue> {
        match self.name.as_str() {
            CMD_ON_METADATA => self.values.first(),
            CMD_SET_DATA_FRAME => match self.values.first().and_then(|v| v.as_str()) {
                Some(CMD_ON_METADATA) => self.values.get(1),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&AmfValue::String(self.name.clone()));
        encoder.encode_all(&self.values);
        encoder.finish()
    }

    pub fn into_message(self) -> Message {
        let stream_id = self.stream_id;
        RtmpMessage::Data(self).into_message(0, stream_id)
    }
}
