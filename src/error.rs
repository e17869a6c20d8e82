//! Unified error types for rtmp-session
//!
//! Every error maps onto an [`ErrorKind`], which is what the session surfaces
//! to the UI/capture layer in `SessionEvent::Error`. Kinds split into
//! session-fatal failures (framing, transport, handshake, rejected commands)
//! and caller misuse (`NotPublishing`, `NotPlaying`, `LicenseRequired`) that is
//! returned synchronously and never closes the session.

use std::fmt;
use std::io;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification surfaced through session events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed chunk data
    Framing,
    /// No handshake response within the connect timeout
    HandshakeTimeout,
    /// Handshake failed for any other reason
    Handshake,
    /// Server answered `connect` with `_error`, or never answered
    ConnectFailed,
    /// Server answered `createStream` with `_error`, or never answered
    CreateStreamFailed,
    /// Server refused `publish`
    PublishRejected,
    /// Server refused `play`
    PlayRejected,
    /// Socket-level failure
    Transport,
    /// `send_frame` or a publish command outside a publish session
    NotPublishing,
    /// A play command outside a play session
    NotPlaying,
    /// License gate refused the connection attempt
    LicenseRequired,
    /// Invalid configuration (bad URL, missing stream name)
    Config,
}

impl ErrorKind {
    /// Whether an error of this kind terminates the session
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ErrorKind::NotPublishing
                | ErrorKind::NotPlaying
                | ErrorKind::LicenseRequired
                | ErrorKind::Config
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Framing => "FramingError",
            ErrorKind::HandshakeTimeout => "HandshakeTimeout",
            ErrorKind::Handshake => "HandshakeError",
            ErrorKind::ConnectFailed => "ConnectFailed",
            ErrorKind::CreateStreamFailed => "CreateStreamFailed",
            ErrorKind::PublishRejected => "PublishRejected",
            ErrorKind::PlayRejected => "PlayRejected",
            ErrorKind::Transport => "TransportError",
            ErrorKind::NotPublishing => "NotPublishing",
            ErrorKind::NotPlaying => "NotPlaying",
            ErrorKind::LicenseRequired => "LicenseRequired",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Unified error type for all session operations
#[derive(Debug)]
pub enum Error {
    /// I/O error on the connection
    Io(io::Error),
    /// Malformed chunk stream
    Framing(FramingError),
    /// AMF encoding/decoding error
    Amf(AmfError),
    /// Handshake failure
    Handshake(HandshakeError),
    /// Media packetization error
    Media(MediaError),
    /// `connect` refused by the server (status code or description)
    ConnectFailed(String),
    /// `createStream` refused by the server
    CreateStreamFailed(String),
    /// `publish` refused by the server
    PublishRejected(String),
    /// `play` refused by the server
    PlayRejected(String),
    /// Network operation timed out outside the handshake
    Timeout,
    /// Peer closed the connection
    ConnectionClosed,
    /// Operation requires an active publish session
    NotPublishing,
    /// Operation requires an active play session
    NotPlaying,
    /// License gate refused the attempt
    LicenseRequired,
    /// Invalid configuration
    Config(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Timeout | Error::ConnectionClosed => ErrorKind::Transport,
            Error::Framing(_) | Error::Amf(_) | Error::Media(_) => ErrorKind::Framing,
            Error::Handshake(HandshakeError::Timeout) => ErrorKind::HandshakeTimeout,
            Error::Handshake(_) => ErrorKind::Handshake,
            Error::ConnectFailed(_) => ErrorKind::ConnectFailed,
            Error::CreateStreamFailed(_) => ErrorKind::CreateStreamFailed,
            Error::PublishRejected(_) => ErrorKind::PublishRejected,
            Error::PlayRejected(_) => ErrorKind::PlayRejected,
            Error::NotPublishing => ErrorKind::NotPublishing,
            Error::NotPlaying => ErrorKind::NotPlaying,
            Error::LicenseRequired => ErrorKind::LicenseRequired,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether this error terminates the session
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// Whether the peer simply never answered in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout | Error::Handshake(HandshakeError::Timeout))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Framing(e) => write!(f, "Framing error: {}", e),
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Handshake(e) => write!(f, "Handshake error: {}", e),
            Error::Media(e) => write!(f, "Media error: {}", e),
            Error::ConnectFailed(msg) => write!(f, "Connect failed: {}", msg),
            Error::CreateStreamFailed(msg) => write!(f, "createStream failed: {}", msg),
            Error::PublishRejected(msg) => write!(f, "Publish rejected: {}", msg),
            Error::PlayRejected(msg) => write!(f, "Play rejected: {}", msg),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::NotPublishing => write!(f, "Session is not publishing"),
            Error::NotPlaying => write!(f, "Session is not playing"),
            Error::LicenseRequired => write!(f, "A valid license is required"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Framing(e) => Some(e),
            Error::Amf(e) => Some(e),
            Error::Handshake(e) => Some(e),
            Error::Media(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<FramingError> for Error {
    fn from(err: FramingError) -> Self {
        Error::Framing(err)
    }
}

impl From<AmfError> for Error {
    fn from(err: AmfError) -> Self {
        Error::Amf(err)
    }
}

impl From<HandshakeError> for Error {
    fn from(err: HandshakeError) -> Self {
        Error::Handshake(err)
    }
}

impl From<MediaError> for Error {
    fn from(err: MediaError) -> Self {
        Error::Media(err)
    }
}

impl From<native_tls::Error> for Error {
    fn from(err: native_tls::Error) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::Other, err))
    }
}

/// Chunk stream framing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Chunk stream id outside 2..=65599
    InvalidChunkStreamId(u32),
    /// A compressed header (fmt 1-3) on a chunk stream with no prior context
    MissingContext { csid: u32, fmt: u8 },
    /// A new message header arrived before the previous message completed
    InterruptedMessage { csid: u32, fmt: u8 },
    /// Declared message length exceeds the sanity limit
    MessageTooLarge { size: u32, max: u32 },
    /// Chunk size outside 1..=0x7FFFFFFF
    InvalidChunkSize(u32),
    /// Control message payload too short
    TruncatedControl(u8),
    /// Command message did not start with a string name
    InvalidCommand(String),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::InvalidChunkStreamId(id) => write!(f, "Invalid chunk stream ID: {}", id),
            FramingError::MissingContext { csid, fmt } => {
                write!(f, "fmt {} chunk on csid {} without prior header", fmt, csid)
            }
            FramingError::InterruptedMessage { csid, fmt } => {
                write!(f, "fmt {} header on csid {} interrupts a partial message", fmt, csid)
            }
            FramingError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max {})", size, max)
            }
            FramingError::InvalidChunkSize(size) => write!(f, "Invalid chunk size: {}", size),
            FramingError::TruncatedControl(t) => {
                write!(f, "Truncated control message of type {}", t)
            }
            FramingError::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
        }
    }
}

impl std::error::Error for FramingError {}

/// AMF encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfError {
    UnknownMarker(u8),
    UnexpectedEof,
    InvalidUtf8,
    InvalidReference(u16),
    NestingTooDeep,
    InvalidObjectEnd,
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnknownMarker(m) => write!(f, "Unknown AMF marker: 0x{:02x}", m),
            AmfError::UnexpectedEof => write!(f, "Unexpected end of AMF data"),
            AmfError::InvalidUtf8 => write!(f, "Invalid UTF-8 in AMF string"),
            AmfError::InvalidReference(idx) => write!(f, "Invalid AMF reference: {}", idx),
            AmfError::NestingTooDeep => write!(f, "AMF nesting too deep"),
            AmfError::InvalidObjectEnd => write!(f, "Invalid object end marker"),
        }
    }
}

impl std::error::Error for AmfError {}

/// Handshake-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// S0 carried an unsupported version byte
    InvalidVersion(u8),
    /// S0/S1/S2 did not arrive within the connect timeout
    Timeout,
    /// Operation not valid in the current handshake state
    InvalidState,
    /// Server closed the connection mid-handshake
    ConnectionClosed,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::InvalidVersion(v) => write!(f, "Invalid RTMP version: {}", v),
            HandshakeError::Timeout => write!(f, "Handshake timed out"),
            HandshakeError::InvalidState => write!(f, "Invalid handshake state"),
            HandshakeError::ConnectionClosed => write!(f, "Connection closed during handshake"),
        }
    }
}

impl std::error::Error for HandshakeError {}

/// Media packetization errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    InvalidAvcPacket,
    InvalidAacPacket,
    InvalidHevcPacket,
    UnsupportedCodec(String),
    MissingSequenceHeader,
    EmptyPayload,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::InvalidAvcPacket => write!(f, "Invalid AVC packet"),
            MediaError::InvalidAacPacket => write!(f, "Invalid AAC packet"),
            MediaError::InvalidHevcPacket => write!(f, "Invalid HEVC packet"),
            MediaError::UnsupportedCodec(c) => write!(f, "Unsupported codec: {}", c),
            MediaError::MissingSequenceHeader => write!(f, "Missing sequence header"),
            MediaError::EmptyPayload => write!(f, "Empty media payload"),
        }
    }
}

impl std::error::Error for MediaError {}
