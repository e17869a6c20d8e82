//! Statistics for an RTMP session
//!
//! Counters are updated from both the read and write loops, so they live in
//! atomics inside [`StatsCollector`]; callers only ever see [`SessionStats`]
//! snapshots.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::media::MediaKind;

/// Point-in-time session statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Time since the transport connected
    pub duration: Duration,
    /// Video frames sent (publish) or received (play)
    pub video_frames: u64,
    /// Audio frames sent or received
    pub audio_frames: u64,
    /// Keyframes sent or received
    pub keyframes: u64,
    /// Frames dropped by the outbound queue, the inbound event queue, or
    /// for arriving before their sequence header
    pub dropped_frames: u64,
    /// Media bitrate over the last sampling interval (bits/sec)
    pub bitrate: u64,
}

impl SessionStats {
    /// Average bitrate over the whole session (bits/sec)
    pub fn average_bitrate(&self) -> u64 {
        let millis = self.duration.as_millis() as u64;
        if millis > 0 {
            self.bytes_total() * 8 * 1000 / millis
        } else {
            0
        }
    }

    fn bytes_total(&self) -> u64 {
        self.bytes_sent.max(self.bytes_received)
    }
}

#[derive(Debug)]
struct BitrateSample {
    at: Instant,
    media_bytes: u64,
    bitrate: u64,
}

/// Shared counters behind [`SessionStats`]
#[derive(Debug)]
pub struct StatsCollector {
    started_at: Instant,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    media_bytes: AtomicU64,
    video_frames: AtomicU64,
    audio_frames: AtomicU64,
    keyframes: AtomicU64,
    dropped_frames: AtomicU64,
    sample: Mutex<BitrateSample>,
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            media_bytes: AtomicU64::new(0),
            video_frames: AtomicU64::new(0),
            audio_frames: AtomicU64::new(0),
            keyframes: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            sample: Mutex::new(BitrateSample {
                at: now,
                media_bytes: 0,
                bitrate: 0,
            }),
        }
    }

    pub fn add_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn add_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Count one media frame passing through the session
    pub fn record_frame(&self, kind: MediaKind, keyframe: bool, payload_len: usize) {
        self.media_bytes.fetch_add(payload_len as u64, Ordering::Relaxed);
        match kind {
            MediaKind::Video => {
                self.video_frames.fetch_add(1, Ordering::Relaxed);
                if keyframe {
                    self.keyframes.fetch_add(1, Ordering::Relaxed);
                }
            }
            MediaKind::Audio => {
                self.audio_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn add_dropped(&self, frames: u64) {
        if frames > 0 {
            self.dropped_frames.fetch_add(frames, Ordering::Relaxed);
        }
    }

    /// Close the current bitrate window and start a new one
    pub fn sample_bitrate(&self) -> u64 {
        let now = Instant::now();
        let media = self.media_bytes.load(Ordering::Relaxed);
        let mut sample = self.sample.lock();
        let elapsed = now.duration_since(sample.at).as_millis() as u64;
        if elapsed > 0 {
            sample.bitrate = media.saturating_sub(sample.media_bytes) * 8 * 1000 / elapsed;
            sample.at = now;
            sample.media_bytes = media;
        }
        sample.bitrate
    }

    /// Snapshot using the most recent bitrate sample
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            duration: self.started_at.elapsed(),
            video_frames: self.video_frames.load(Ordering::Relaxed),
            audio_frames: self.audio_frames.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            bitrate: self.sample.lock().bitrate,
        }
    }
}
