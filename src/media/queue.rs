//! Bounded outbound media queue
//!
//! Filled by the capture thread through `send_frame`, drained by the write
//! loop. Pushing never blocks. When full, the oldest queued video frame is
//! evicted (then the oldest audio frame if no video is queued); sequence
//! headers are never evicted.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

use crate::media::frame::{MediaFrame, MediaKind, SequenceHeader};

/// Item waiting to be packetized
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMedia {
    SequenceHeader(SequenceHeader),
    Frame(MediaFrame),
}

impl OutboundMedia {
    fn frame_kind(&self) -> Option<MediaKind> {
        match self {
            OutboundMedia::Frame(f) => Some(f.kind),
            OutboundMedia::SequenceHeader(_) => None,
        }
    }
}

/// What happened to a pushed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting an older frame
    EvictedOldest,
    /// Queue held only sequence headers; the new frame was dropped
    Rejected,
    /// Queue is closed
    Closed,
}

/// Non-blocking bounded queue shared by caller and write loop
#[derive(Debug)]
pub struct MediaQueue {
    items: Mutex<VecDeque<OutboundMedia>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl MediaQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn push(&self, item: OutboundMedia) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }

        let outcome = {
            let mut items = self.items.lock();
            if items.len() < self.capacity {
                items.push_back(item);
                PushOutcome::Queued
            } else {
                let victim = items
                    .iter()
                    .position(|i| i.frame_kind() == Some(MediaKind::Video))
                    .or_else(|| items.iter().position(|i| i.frame_kind().is_some()));
                match (victim, &item) {
                    (Some(index), _) => {
                        items.remove(index);
                        items.push_back(item);
                        PushOutcome::EvictedOldest
                    }
                    (None, OutboundMedia::SequenceHeader(_)) => {
                        items.push_back(item);
                        PushOutcome::Queued
                    }
                    (None, OutboundMedia::Frame(_)) => PushOutcome::Rejected,
                }
            }
        };

        match outcome {
            PushOutcome::EvictedOldest | PushOutcome::Rejected => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dropped = total, "Media queue full, dropped frame");
            }
            _ => {}
        }
        if outcome != PushOutcome::Rejected {
            self.notify.notify_one();
        }
        outcome
    }

    pub fn try_pop(&self) -> Option<OutboundMedia> {
        self.items.lock().pop_front()
    }

    /// Wait for the next item; `None` once closed and drained
    ///
    /// Cancel safe: an item is only removed when it is returned.
    pub async fn pop(&self) -> Option<OutboundMedia> {
        loop {
            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting items and wake the consumer
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Discard everything still queued, returning how many frames were lost
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let frames = items.iter().filter(|i| i.frame_kind().is_some()).count();
        items.clear();
        frames
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
