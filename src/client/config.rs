//! Client configuration

use std::sync::Arc;
use std::time::Duration;

use crate::amf::AmfObject;
use crate::client::license::{LicenseGate, StaticLicense};
use crate::error::{Error, Result};
use crate::media::HEVC_FOURCC;
use crate::protocol::constants::*;
use crate::protocol::message::ConnectParams;
use crate::session::{SessionMode, SessionParams};

/// Session configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// RTMP URL to connect to (rtmp[s]://host[:port]/app[/stream])
    pub url: String,

    /// Publish or play
    pub mode: SessionMode,

    /// Stream name; overrides the one in the URL when set
    pub stream_name: Option<String>,

    /// TCP/TLS connect and handshake timeout
    pub connect_timeout: Duration,

    /// How long to wait for a server answer to connect/createStream/publish/play
    pub command_timeout: Duration,

    /// How long `stop` waits for both loops before force-closing
    pub shutdown_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Flash version string to send
    pub flash_ver: String,

    /// SWF URL to send
    pub swf_url: Option<String>,

    /// Page URL to send
    pub page_url: Option<String>,

    /// Play buffer length in milliseconds
    pub buffer_length: u32,

    /// Outbound chunk size announced after connect (None keeps 128)
    pub chunk_size: Option<u32>,

    /// Window we ask the server to acknowledge against
    pub window_ack_size: u32,

    /// Outbound media queue capacity in frames
    pub media_queue_capacity: usize,

    /// Received frames buffered for the consumer before the oldest is dropped
    pub frame_queue_depth: usize,

    /// How often a `Stats` event is emitted (None disables)
    pub stats_interval: Option<Duration>,

    /// Unacknowledged bytes beyond this many windows raise `Stalled`
    pub stall_multiple: u32,

    /// Stream metadata sent as `@setDataFrame onMetaData` when publishing
    pub metadata: Option<AmfObject>,

    /// Offer enhanced RTMP (`fourCcList: ["hvc1"]`) in `connect`
    pub enhanced_rtmp: bool,

    /// Gate consulted before any network I/O
    pub license: Arc<dyn LicenseGate>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            mode: SessionMode::Publish,
            stream_name: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(3),
            tcp_nodelay: true,
            flash_ver: DEFAULT_FLASH_VER.to_string(),
            swf_url: None,
            page_url: None,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            chunk_size: None,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            media_queue_capacity: 256,
            frame_queue_depth: 30,
            stats_interval: Some(Duration::from_secs(1)),
            stall_multiple: 2,
            metadata: None,
            enhanced_rtmp: false,
            license: Arc::new(StaticLicense::default()),
        }
    }
}

impl ClientConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Publishing session for the given URL
    pub fn publish(url: impl Into<String>) -> Self {
        Self::new(url).mode(SessionMode::Publish)
    }

    /// Playing session for the given URL
    pub fn play(url: impl Into<String>) -> Self {
        Self::new(url).mode(SessionMode::Play)
    }

    pub fn mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn flash_ver(mut self, flash_ver: impl Into<String>) -> Self {
        self.flash_ver = flash_ver.into();
        self
    }

    pub fn swf_url(mut self, url: impl Into<String>) -> Self {
        self.swf_url = Some(url.into());
        self
    }

    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn buffer_length(mut self, ms: u32) -> Self {
        self.buffer_length = ms;
        self
    }

    pub fn chunk_size(mut self, size: u32) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn media_queue_capacity(mut self, frames: usize) -> Self {
        self.media_queue_capacity = frames;
        self
    }

    pub fn frame_queue_depth(mut self, frames: usize) -> Self {
        self.frame_queue_depth = frames;
        self
    }

    pub fn stats_interval(mut self, interval: Option<Duration>) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn stall_multiple(mut self, multiple: u32) -> Self {
        self.stall_multiple = multiple;
        self
    }

    pub fn metadata(mut self, metadata: AmfObject) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn enhanced_rtmp(mut self, enabled: bool) -> Self {
        self.enhanced_rtmp = enabled;
        self
    }

    pub fn license(mut self, gate: impl LicenseGate + 'static) -> Self {
        self.license = Arc::new(gate);
        self
    }

    /// Parse URL into components
    pub fn parse_url(&self) -> Option<ParsedUrl> {
        let (tls, rest) = if let Some(rest) = self.url.strip_prefix("rtmps://") {
            (true, rest)
        } else {
            (false, self.url.strip_prefix("rtmp://")?)
        };

        let (host_port, path) = rest.split_once('/')?;
        let default_port = if tls { RTMPS_PORT } else { RTMP_PORT };
        // [v6]:port keeps its brackets so `address()` stays connectable
        let split = match host_port.rfind(']') {
            Some(end) => host_port[end + 1..]
                .strip_prefix(':')
                .map(|p| (&host_port[..=end], p)),
            None => host_port.split_once(':'),
        };
        let (host, port) = match split {
            Some((h, p)) => (h.to_string(), p.parse().ok()?),
            None => (host_port.to_string(), default_port),
        };
        if host.is_empty() {
            return None;
        }

        let (app, stream_key) = match path.split_once('/') {
            Some((a, s)) if !s.is_empty() => (a.to_string(), Some(s.to_string())),
            Some((a, _)) => (a.to_string(), None),
            None => (path.to_string(), None),
        };
        if app.is_empty() {
            return None;
        }

        Some(ParsedUrl {
            tls,
            host,
            port,
            app,
            stream_key,
        })
    }

    /// Resolve everything the session state machine needs
    pub(crate) fn session_params(&self, url: &ParsedUrl) -> SessionParams {
        SessionParams {
            mode: self.mode,
            connect: ConnectParams {
                app: url.app.clone(),
                tc_url: url.tc_url(),
                flash_ver: self.flash_ver.clone(),
                swf_url: self.swf_url.clone(),
                page_url: self.page_url.clone(),
                fourcc_list: if self.enhanced_rtmp {
                    vec![String::from_utf8_lossy(&HEVC_FOURCC).into_owned()]
                } else {
                    Vec::new()
                },
            },
            stream_name: self
                .stream_name
                .clone()
                .or_else(|| url.stream_key.clone())
                .unwrap_or_default(),
            command_timeout: self.command_timeout,
            buffer_length_ms: self.buffer_length,
            window_ack_size: self.window_ack_size,
            metadata: self.metadata.clone(),
        }
    }

    /// Reject values the session cannot work with
    pub fn validate(&self) -> Result<ParsedUrl> {
        let url = self
            .parse_url()
            .ok_or_else(|| Error::Config(format!("invalid RTMP URL: {}", self.url)))?;
        if let Some(size) = self.chunk_size {
            if size == 0 || size > MAX_CHUNK_SIZE {
                return Err(Error::Config(format!("invalid chunk size: {}", size)));
            }
        }
        if self.window_ack_size == 0 {
            return Err(Error::Config("window ack size must be non-zero".into()));
        }
        Ok(url)
    }
}

/// Parsed RTMP URL components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: Option<String>,
}

impl ParsedUrl {
    /// `host:port` for the socket
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// tcUrl sent in `connect`: scheme, authority and app, no stream name
    pub fn tc_url(&self) -> String {
        let scheme = if self.tls { "rtmps" } else { "rtmp" };
        let default_port = if self.tls { RTMPS_PORT } else { RTMP_PORT };
        if self.port == default_port {
            format!("{}://{}/{}", scheme, self.host, self.app)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, self.app)
        }
    }
}
