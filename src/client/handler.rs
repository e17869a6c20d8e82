//! Callback-style event subscription
//!
//! An alternative to polling [`SessionManager::next_event`]: implement the
//! methods you care about and hand the handler to [`dispatch_events`].

use async_trait::async_trait;

use crate::amf::AmfValue;
use crate::client::events::{CloseReason, SessionEvent};
use crate::client::manager::SessionManager;
use crate::error::ErrorKind;
use crate::media::{CodecConfig, MediaFrame};
use crate::session::SessionState;
use crate::stats::SessionStats;

/// Handler trait for session events
///
/// All methods have empty default implementations.
///
/// # Example
///
/// ```ignore
/// use rtmp_session::client::SessionHandler;
/// use rtmp_session::media::MediaFrame;
///
/// struct Renderer;
///
/// #[async_trait::async_trait]
/// impl SessionHandler for Renderer {
///     async fn on_frame(&self, frame: MediaFrame) {
///         println!("{:?} frame at {}ms", frame.kind, frame.timestamp);
///     }
/// }
/// ```
#[async_trait]
pub trait SessionHandler: Send + Sync {
    async fn on_state_changed(&self, _state: SessionState) {}

    async fn on_codec_configured(&self, _config: CodecConfig) {}

    async fn on_metadata(&self, _metadata: AmfValue) {}

    /// Should return within one frame interval
    async fn on_frame(&self, _frame: MediaFrame) {}

    async fn on_stream_ended(&self) {}

    async fn on_stats(&self, _stats: SessionStats) {}

    async fn on_stalled(&self, _unacknowledged: u64) {}

    async fn on_error(&self, _kind: ErrorKind, _message: String) {}

    /// Called exactly once, last
    async fn on_closed(&self, _reason: CloseReason) {}
}

/// Deliver one event to `handler`
pub async fn dispatch<H: SessionHandler + ?Sized>(handler: &H, event: SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => handler.on_state_changed(state).await,
        SessionEvent::CodecConfigured(config) => handler.on_codec_configured(config).await,
        SessionEvent::Metadata(metadata) => handler.on_metadata(metadata).await,
        SessionEvent::FrameReceived(frame) => handler.on_frame(frame).await,
        SessionEvent::StreamEnded => handler.on_stream_ended().await,
        SessionEvent::Stats(stats) => handler.on_stats(stats).await,
        SessionEvent::Stalled { unacknowledged } => handler.on_stalled(unacknowledged).await,
        SessionEvent::Error { kind, message, .. } => handler.on_error(kind, message).await,
        SessionEvent::SessionClosed(reason) => handler.on_closed(reason).await,
    }
}

/// Pump every event of `session` into `handler` until the session closes
pub async fn dispatch_events<H: SessionHandler + ?Sized>(session: &SessionManager, handler: &H) {
    while let Some(event) = session.next_event().await {
        dispatch(handler, event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SessionHandler for Recorder {
        async fn on_state_changed(&self, state: SessionState) {
            self.calls.lock().push(format!("state:{:?}", state));
        }

        async fn on_error(&self, kind: ErrorKind, _message: String) {
            self.calls.lock().push(format!("error:{}", kind));
        }

        async fn on_closed(&self, reason: CloseReason) {
            self.calls.lock().push(format!("closed:{:?}", reason));
        }
    }

    #[tokio::test]
    async fn test_dispatch_routes_events() {
        let recorder = Recorder::default();
        dispatch(&recorder, SessionEvent::StateChanged(SessionState::Connected)).await;
        dispatch(&recorder, SessionEvent::StreamEnded).await;
        dispatch(
            &recorder,
            SessionEvent::Error {
                kind: ErrorKind::ConnectFailed,
                message: "rejected".into(),
                timed_out: false,
            },
        )
        .await;
        dispatch(&recorder, SessionEvent::SessionClosed(CloseReason::PeerClosed)).await;

        assert_eq!(
            *recorder.calls.lock(),
            vec![
                "state:Connected".to_string(),
                "error:ConnectFailed".to_string(),
                "closed:PeerClosed".to_string(),
            ]
        );
    }
}
