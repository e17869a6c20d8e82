//! Session events delivered to the caller
//!
//! Events are delivered in the order they were produced. Only
//! `FrameReceived` may be dropped: once more than the configured depth of
//! frames is waiting, the oldest waiting frame is discarded. Periodic
//! reports (`Stats`, `Stalled`) coalesce: a new one replaces an unread one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

use crate::amf::AmfValue;
use crate::error::ErrorKind;
use crate::media::{CodecConfig, MediaFrame};
use crate::session::SessionState;
use crate::stats::SessionStats;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `stop()` was called
    UserRequested,
    /// The server refused connect/createStream/publish/play
    Rejected(ErrorKind),
    /// Framing, handshake or transport failure
    Error(ErrorKind),
    /// The server closed the connection
    PeerClosed,
}

/// Everything a session reports
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Play: codec configuration from a sequence header
    CodecConfigured(CodecConfig),
    /// Play: onMetaData from the server
    Metadata(AmfValue),
    /// Play: a decoded-order media frame
    FrameReceived(MediaFrame),
    /// Play: the server ended the stream
    StreamEnded,
    Stats(SessionStats),
    /// The server's acknowledgements lag far behind what we sent
    Stalled { unacknowledged: u64 },
    Error {
        kind: ErrorKind,
        message: String,
        /// The server or network never answered, as opposed to refusing
        timed_out: bool,
    },
    /// Always the last event of a session
    SessionClosed(CloseReason),
}

impl SessionEvent {
    /// Only the latest unread instance is worth keeping
    fn coalesces(&self) -> bool {
        matches!(self, SessionEvent::Stats(_) | SessionEvent::Stalled { .. })
    }
}

#[derive(Debug, Default)]
struct Inner {
    events: VecDeque<SessionEvent>,
    frames: usize,
    closed: bool,
}

/// Ordered event queue with drop-oldest for received frames
#[derive(Debug)]
pub struct EventQueue {
    inner: Mutex<Inner>,
    frame_depth: usize,
    notify: Notify,
    dropped_frames: AtomicU64,
}

impl EventQueue {
    pub fn new(frame_depth: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            frame_depth: frame_depth.max(1),
            notify: Notify::new(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Queue an event; returns false once the session has closed
    pub fn push(&self, event: SessionEvent) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }

            let closing = matches!(event, SessionEvent::SessionClosed(_));
            if matches!(event, SessionEvent::FrameReceived(_)) {
                if inner.frames >= self.frame_depth {
                    if let Some(index) = inner
                        .events
                        .iter()
                        .position(|e| matches!(e, SessionEvent::FrameReceived(_)))
                    {
                        inner.events.remove(index);
                        inner.frames -= 1;
                        self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!("Consumer behind, dropped oldest frame");
                    }
                }
                inner.frames += 1;
            } else if event.coalesces() {
                let kind = std::mem::discriminant(&event);
                inner.events.retain(|e| std::mem::discriminant(e) != kind);
            }
            inner.events.push_back(event);
            if closing {
                inner.closed = true;
            }
        }
        self.notify.notify_one();
        true
    }

    pub fn try_next(&self) -> Option<SessionEvent> {
        let mut inner = self.inner.lock();
        let event = inner.events.pop_front()?;
        if matches!(event, SessionEvent::FrameReceived(_)) {
            inner.frames -= 1;
        }
        Some(event)
    }

    /// Wait for the next event; `None` after `SessionClosed` has been taken
    pub async fn next(&self) -> Option<SessionEvent> {
        loop {
            let notified = self.notify.notified();
            {
                if let Some(event) = self.try_next() {
                    return Some(event);
                }
                if self.inner.lock().closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Whether `SessionClosed` has been queued
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames discarded because the consumer fell behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;

    fn frame(ts: u32) -> SessionEvent {
        SessionEvent::FrameReceived(MediaFrame::h264(ts, false, Bytes::from_static(&[0])))
    }

    #[test]
    fn test_drops_oldest_frame_only() {
        let queue = EventQueue::new(2);
        queue.push(SessionEvent::StateChanged(SessionState::Playing));
        queue.push(frame(0));
        queue.push(frame(33));
        queue.push(SessionEvent::StreamEnded);
        queue.push(frame(66));

        assert_eq!(queue.dropped_frames(), 1);
        assert_eq!(
            queue.try_next(),
            Some(SessionEvent::StateChanged(SessionState::Playing))
        );
        assert_eq!(queue.try_next(), Some(frame(33)));
        assert_eq!(queue.try_next(), Some(SessionEvent::StreamEnded));
        assert_eq!(queue.try_next(), Some(frame(66)));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn test_unread_stats_coalesce() {
        let queue = EventQueue::new(30);
        queue.push(SessionEvent::StateChanged(SessionState::Publishing));
        for _ in 0..100_000 {
            queue.push(SessionEvent::Stats(SessionStats::default()));
        }
        queue.push(SessionEvent::Error {
            kind: ErrorKind::Transport,
            message: "reset".into(),
            timed_out: false,
        });
        let latest = SessionStats {
            bytes_sent: 42,
            ..Default::default()
        };
        queue.push(SessionEvent::Stats(latest.clone()));
        queue.push(SessionEvent::Stalled { unacknowledged: 1 });
        queue.push(SessionEvent::Stalled { unacknowledged: 2 });
        queue.push(SessionEvent::SessionClosed(CloseReason::Error(ErrorKind::Transport)));

        assert_eq!(queue.len(), 5);
        assert_eq!(
            queue.try_next(),
            Some(SessionEvent::StateChanged(SessionState::Publishing))
        );
        assert!(matches!(queue.try_next(), Some(SessionEvent::Error { .. })));
        assert_eq!(queue.try_next(), Some(SessionEvent::Stats(latest)));
        assert_eq!(queue.try_next(), Some(SessionEvent::Stalled { unacknowledged: 2 }));
        assert!(matches!(queue.try_next(), Some(SessionEvent::SessionClosed(_))));
    }

    #[test]
    fn test_nothing_after_close() {
        let queue = EventQueue::new(4);
        assert!(queue.push(SessionEvent::SessionClosed(CloseReason::UserRequested)));
        assert!(!queue.push(SessionEvent::StreamEnded));
        assert!(queue.is_closed());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_next_waits_and_ends() {
        let queue = Arc::new(EventQueue::new(4));
        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                queue.push(SessionEvent::StreamEnded);
                queue.push(SessionEvent::SessionClosed(CloseReason::PeerClosed));
            })
        };

        assert_eq!(queue.next().await, Some(SessionEvent::StreamEnded));
        assert_eq!(
            queue.next().await,
            Some(SessionEvent::SessionClosed(CloseReason::PeerClosed))
        );
        assert_eq!(queue.next().await, None);
        producer.await.unwrap();
    }
}
