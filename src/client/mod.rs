//! RTMP client sessions
//!
//! - [`SessionManager`]: one publish or play session over one connection
//! - [`Publisher`] / [`Player`]: thin adapters selected by [`SessionMode`](crate::session::SessionMode)
//! - [`SessionEvent`]: everything a session reports, in order

pub mod config;
pub mod events;
pub mod handler;
pub mod license;
pub mod manager;
pub mod player;
pub mod publisher;
pub mod transport;

pub use config::{ClientConfig, ParsedUrl};
pub use events::{CloseReason, EventQueue, SessionEvent};
pub use handler::{dispatch_events, SessionHandler};
pub use license::{LicenseGate, StaticLicense};
pub use manager::SessionManager;
pub use player::Player;
pub use publisher::{Publisher, PublisherStatus};
