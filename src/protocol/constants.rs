//! RTMP protocol constants
//!
//! Reference: Adobe RTMP Specification (December 2012)

/// RTMP version sent in C0
pub const RTMP_VERSION: u8 = 3;

pub const RTMP_PORT: u16 = 1935;
pub const RTMPS_PORT: u16 = 443;

/// C1/S1/C2/S2 size
pub const HANDSHAKE_SIZE: usize = 1536;

/// Chunk size in effect until a SetChunkSize message changes it
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// SetChunkSize values have the top bit reserved
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

/// Sanity limit for a single reassembled message
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// 3-byte timestamp value signalling a 4-byte extended timestamp
pub const EXTENDED_TIMESTAMP: u32 = 0xFF_FFFF;

/// Largest chunk stream id expressible in a 3-byte basic header
pub const MAX_CSID: u32 = 65599;

// ============================================================================
// Chunk Stream IDs
// ============================================================================

/// Protocol control messages (SetChunkSize, Ack, WindowAckSize, UserControl)
pub const CSID_PROTOCOL_CONTROL: u32 = 2;

/// Command messages on stream 0 (connect, createStream)
pub const CSID_COMMAND: u32 = 3;

/// Audio data
pub const CSID_AUDIO: u32 = 4;

/// Stream-level commands and data (publish, play, @setDataFrame)
pub const CSID_STREAM_COMMAND: u32 = 5;

/// Video data
pub const CSID_VIDEO: u32 = 6;

// ============================================================================
// Message Type IDs
// ============================================================================

pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACKNOWLEDGEMENT: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_COMMAND_AMF0: u8 = 20;

// ============================================================================
// User Control Event Types
// ============================================================================

pub const UC_STREAM_BEGIN: u16 = 0;
pub const UC_STREAM_EOF: u16 = 1;
pub const UC_STREAM_DRY: u16 = 2;
pub const UC_SET_BUFFER_LENGTH: u16 = 3;
pub const UC_STREAM_IS_RECORDED: u16 = 4;
pub const UC_PING_REQUEST: u16 = 6;
pub const UC_PING_RESPONSE: u16 = 7;

// ============================================================================
// Commands
// ============================================================================

pub const CMD_CONNECT: &str = "connect";
pub const CMD_CREATE_STREAM: &str = "createStream";
pub const CMD_RELEASE_STREAM: &str = "releaseStream";
pub const CMD_FC_PUBLISH: &str = "FCPublish";
pub const CMD_FC_UNPUBLISH: &str = "FCUnpublish";
pub const CMD_PUBLISH: &str = "publish";
pub const CMD_PLAY: &str = "play";
pub const CMD_PAUSE: &str = "pause";
pub const CMD_CLOSE_STREAM: &str = "closeStream";
pub const CMD_DELETE_STREAM: &str = "deleteStream";
pub const CMD_RESULT: &str = "_result";
pub const CMD_ERROR: &str = "_error";
pub const CMD_ON_STATUS: &str = "onStatus";
pub const CMD_ON_BW_DONE: &str = "onBWDone";

pub const CMD_SET_DATA_FRAME: &str = "@setDataFrame";
pub const CMD_ON_METADATA: &str = "onMetaData";

// ============================================================================
// Status codes
// ============================================================================

pub const NC_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
pub const NS_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const NS_PLAY_START: &str = "NetStream.Play.Start";
pub const NS_PLAY_RESET: &str = "NetStream.Play.Reset";
pub const NS_PLAY_STOP: &str = "NetStream.Play.Stop";
pub const NS_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
pub const NS_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";

// ============================================================================
// Client defaults
// ============================================================================

/// Window size advertised when the server never sets one
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Play buffer length sent in SetBufferLength
pub const DEFAULT_BUFFER_LENGTH: u32 = 1000;

/// flashVer sent in connect
pub const DEFAULT_FLASH_VER: &str = "FMLE/3.0 (compatible; rtmp-session)";

// ============================================================================
// Chunk header formats
// ============================================================================

/// 11-byte header: timestamp, length, type, stream id
pub const CHUNK_FMT_0: u8 = 0;
/// 7-byte header: timestamp delta, length, type
pub const CHUNK_FMT_1: u8 = 1;
/// 3-byte header: timestamp delta
pub const CHUNK_FMT_2: u8 = 2;
/// No message header
pub const CHUNK_FMT_3: u8 = 3;
