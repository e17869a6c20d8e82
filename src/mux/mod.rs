//! Message multiplexing over chunk streams
//!
//! - [`Muxer`]: chunk stream selection and framing of outbound messages
//! - [`Demuxer`]: reassembly of inbound messages, chunk-level control
//! - [`AckTracker`] / [`StallMonitor`]: window acknowledgement in both
//!   directions

pub mod ack;
pub mod inbound;
pub mod outbound;

pub use ack::{AckTracker, StallMonitor};
pub use inbound::Demuxer;
pub use outbound::{csid_for, Muxer};
