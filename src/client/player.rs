//! Player adapter

use std::ops::Deref;

use crate::client::config::ClientConfig;
use crate::client::events::SessionEvent;
use crate::client::manager::SessionManager;
use crate::error::{Error, Result};
use crate::media::MediaFrame;
use crate::session::SessionMode;

/// Play-side adapter
pub struct Player {
    session: SessionManager,
    paused: bool,
}

impl Player {
    /// Connect and start playing as soon as the server accepts `connect`
    pub async fn start(config: ClientConfig) -> Result<Self> {
        if config.mode != SessionMode::Play {
            return Err(Error::NotPlaying);
        }
        let session = SessionManager::connect(config).await?;
        session.start_play()?;
        Ok(Self {
            session,
            paused: false,
        })
    }

    /// Wrap an existing play session
    pub fn from_session(session: SessionManager) -> Result<Self> {
        if session.mode() != SessionMode::Play {
            return Err(Error::NotPlaying);
        }
        Ok(Self {
            session,
            paused: false,
        })
    }

    pub fn pause(&mut self, paused: bool) -> Result<()> {
        self.session.pause(paused)?;
        self.paused = paused;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Next received frame, skipping other events
    ///
    /// `None` once the session has closed.
    pub async fn next_frame(&self) -> Option<MediaFrame> {
        loop {
            match self.session.next_event().await? {
                SessionEvent::FrameReceived(frame) => return Some(frame),
                other => tracing::trace!(event = ?other, "Skipping event"),
            }
        }
    }

    pub fn into_session(self) -> SessionManager {
        self.session
    }
}

impl Deref for Player {
    type Target = SessionManager;

    fn deref(&self) -> &SessionManager {
        &self.session
    }
}
