//! Publisher adapter
//!
//! Thin wrapper over a publish-mode [`SessionManager`] with the legacy
//! numeric status codes capture front-ends expect.

use std::ops::Deref;

use crate::client::config::ClientConfig;
use crate::client::events::{CloseReason, SessionEvent};
use crate::client::manager::SessionManager;
use crate::error::{Error, ErrorKind, Result};
use crate::media::{MediaFrame, PushOutcome, SequenceHeader};
use crate::session::{SessionMode, SessionState};

/// Legacy publisher status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PublisherStatus {
    Connecting = 2000,
    PreviewReady = 2001,
    Stopped = 2002,
    Error = 2003,
    ConnectionStarted = 2004,
    StreamConnected = 2005,
    NetworkTimeout = 2006,
    Disconnected = 2007,
}

impl PublisherStatus {
    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn description(&self) -> &'static str {
        match self {
            PublisherStatus::Connecting => "Connecting",
            PublisherStatus::PreviewReady => "Preview Ready",
            PublisherStatus::Stopped => "Stopped",
            PublisherStatus::Error => "Error",
            PublisherStatus::ConnectionStarted => "Connection Started",
            PublisherStatus::StreamConnected => "Stream Connected",
            PublisherStatus::NetworkTimeout => "Network Timeout",
            PublisherStatus::Disconnected => "Disconnected",
        }
    }

    /// Status for a session event, if it has one
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::StateChanged(SessionState::Connecting) => Some(PublisherStatus::Connecting),
            SessionEvent::StateChanged(SessionState::Connected) => {
                Some(PublisherStatus::ConnectionStarted)
            }
            SessionEvent::StateChanged(SessionState::Publishing) => {
                Some(PublisherStatus::StreamConnected)
            }
            SessionEvent::Error {
                kind: ErrorKind::HandshakeTimeout,
                ..
            }
            | SessionEvent::Error { timed_out: true, .. } => Some(PublisherStatus::NetworkTimeout),
            SessionEvent::Error { .. } => Some(PublisherStatus::Error),
            SessionEvent::SessionClosed(CloseReason::UserRequested) => Some(PublisherStatus::Stopped),
            SessionEvent::SessionClosed(_) => Some(PublisherStatus::Disconnected),
            _ => None,
        }
    }
}

/// Publish-side adapter
pub struct Publisher {
    session: SessionManager,
}

impl Publisher {
    /// Connect and start publishing as soon as the server accepts `connect`
    pub async fn start(config: ClientConfig) -> Result<Self> {
        if config.mode != SessionMode::Publish {
            return Err(Error::NotPublishing);
        }
        let session = SessionManager::connect(config).await?;
        session.start_publish()?;
        Ok(Self { session })
    }

    /// Wrap an existing publish session
    pub fn from_session(session: SessionManager) -> Result<Self> {
        if session.mode() != SessionMode::Publish {
            return Err(Error::NotPublishing);
        }
        Ok(Self { session })
    }

    /// Producer callback for the capture/encode subsystem
    pub fn on_encoded_frame(&self, frame: MediaFrame) -> Result<PushOutcome> {
        self.session.send_frame(frame)
    }

    pub fn set_sequence_header(&self, header: SequenceHeader) -> Result<()> {
        self.session.send_sequence_header(header)
    }

    /// Legacy numeric code for `event`, if it maps to one
    pub fn status_code(event: &SessionEvent) -> Option<u32> {
        PublisherStatus::from_event(event).map(|s| s.code())
    }

    /// Next event paired with its legacy status code
    pub async fn next_status(&self) -> Option<(SessionEvent, Option<PublisherStatus>)> {
        let event = self.session.next_event().await?;
        let status = PublisherStatus::from_event(&event);
        Some((event, status))
    }

    pub fn into_session(self) -> SessionManager {
        self.session
    }
}

impl Deref for Publisher {
    type Target = SessionManager;

    fn deref(&self) -> &SessionManager {
        &self.session
    }
}
