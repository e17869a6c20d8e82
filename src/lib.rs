//! rtmp-session: RTMP publish/play session engine
//!
//! This library drives one client-side RTMP session per connection:
//! - Handshake, chunk stream framing and AMF0 commands
//! - Publish: H.264/H.265/AAC frames in, RTMP audio/video messages out, with a
//!   bounded non-blocking outbound queue
//! - Play: RTMP messages in, codec configuration and frames out as events
//! - Window acknowledgements, ping replies and stall detection
//!
//! # Example: Publish
//!
//! ```no_run
//! use bytes::Bytes;
//! use rtmp_session::client::{ClientConfig, SessionManager, StaticLicense};
//! use rtmp_session::media::{MediaFrame, SequenceHeader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::publish("rtmp://localhost/live/test")
//!         .license(StaticLicense::new("my-license-key"));
//!     let session = SessionManager::connect(config).await?;
//!     session.start_publish()?;
//!
//!     let sps = Bytes::from_static(&[0x67, 0x42, 0x00, 0x1F]);
//!     let pps = Bytes::from_static(&[0x68, 0xCE, 0x38, 0x80]);
//!     session.send_sequence_header(SequenceHeader::from_parameter_sets(sps, pps)?)?;
//!
//!     // ... once the state is Publishing:
//!     let frame = MediaFrame::h264(0, true, Bytes::from_static(&[0, 0, 0, 1, 0x65]));
//!     let _ = session.send_frame(frame);
//!
//!     session.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod amf;
pub mod client;
pub mod error;
pub mod media;
pub mod mux;
pub mod protocol;
pub mod session;
pub mod stats;

// Re-export main types for convenience
pub use client::{
    ClientConfig, CloseReason, Player, Publisher, SessionEvent, SessionHandler, SessionManager,
    StaticLicense,
};
pub use error::{Error, ErrorKind, Result};
pub use media::{Codec, CodecConfig, MediaFrame, MediaKind, SequenceHeader};
pub use session::{SessionMode, SessionState};
pub use stats::SessionStats;
