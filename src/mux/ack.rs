//! Window acknowledgement bookkeeping
//!
//! Two directions:
//! - [`AckTracker`]: bytes *we* received; an Acknowledgement is owed every
//!   time the count crosses the window the server announced.
//! - [`StallMonitor`]: bytes *we* sent versus the server's last
//!   Acknowledgement. A lag beyond `multiple * window` is a stall.

/// Inbound byte counter driving our Acknowledgement messages
#[derive(Debug, Clone)]
pub struct AckTracker {
    window: u32,
    received: u64,
    last_acked: u64,
}

impl AckTracker {
    pub fn new(window: u32) -> Self {
        Self {
            window,
            received: 0,
            last_acked: 0,
        }
    }

    /// Server sent WindowAckSize
    pub fn set_window(&mut self, window: u32) {
        self.window = window;
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn total_received(&self) -> u64 {
        self.received
    }

    /// Count `n` bytes read from the socket
    ///
    /// Returns the sequence number to acknowledge when the window is crossed.
    /// The sequence number wraps at 32 bits.
    pub fn on_bytes(&mut self, n: usize) -> Option<u32> {
        self.received += n as u64;
        if self.window == 0 || self.received - self.last_acked < self.window as u64 {
            return None;
        }
        self.last_acked = self.received;
        Some(self.received as u32)
    }
}

/// Detects a peer that stopped acknowledging what we send
#[derive(Debug, Clone)]
pub struct StallMonitor {
    window: u32,
    multiple: u32,
    last_ack: u64,
    stalled: bool,
}

impl StallMonitor {
    pub fn new(window: u32, multiple: u32) -> Self {
        Self {
            window,
            multiple,
            last_ack: 0,
            stalled: false,
        }
    }

    /// The window the peer acknowledges against (our WindowAckSize)
    pub fn set_window(&mut self, window: u32) {
        self.window = window;
    }

    /// Peer sent Acknowledgement
    ///
    /// Sequence numbers are 32-bit; `bytes_sent` disambiguates wraparound.
    pub fn on_ack(&mut self, sequence: u32, bytes_sent: u64) {
        let high = bytes_sent & !0xFFFF_FFFF;
        let mut acked = high | sequence as u64;
        if acked > bytes_sent {
            acked = acked.saturating_sub(1 << 32);
        }
        self.last_ack = acked.max(self.last_ack);
        self.stalled = false;
    }

    /// Check the sent byte count
    ///
    /// Returns the unacknowledged byte count the first time the threshold is
    /// exceeded; stays quiet until an ack clears the stall.
    pub fn check(&mut self, bytes_sent: u64) -> Option<u64> {
        if self.window == 0 || self.multiple == 0 || self.stalled {
            return None;
        }
        let unacknowledged = bytes_sent.saturating_sub(self.last_ack);
        if unacknowledged > self.window as u64 * self.multiple as u64 {
            self.stalled = true;
            return Some(unacknowledged);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_after_window() {
        let mut tracker = AckTracker::new(1000);
        assert_eq!(tracker.on_bytes(600), None);
        assert_eq!(tracker.on_bytes(399), None);
        assert_eq!(tracker.on_bytes(1), Some(1000));
        assert_eq!(tracker.on_bytes(999), None);
        assert_eq!(tracker.on_bytes(5000), Some(6999));
        assert_eq!(tracker.total_received(), 6999);
    }

    #[test]
    fn test_window_change_applies_to_next_check() {
        let mut tracker = AckTracker::new(1000);
        tracker.on_bytes(500);
        tracker.set_window(400);
        assert_eq!(tracker.on_bytes(1), Some(501));
    }

    #[test]
    fn test_zero_window_never_acks() {
        let mut tracker = AckTracker::new(0);
        assert_eq!(tracker.on_bytes(10_000_000), None);
    }

    #[test]
    fn test_stall_reported_once_until_ack() {
        let mut monitor = StallMonitor::new(1000, 2);
        assert_eq!(monitor.check(2000), None);
        assert_eq!(monitor.check(2001), Some(2001));
        assert_eq!(monitor.check(5000), None);

        monitor.on_ack(4500, 5000);
        assert_eq!(monitor.check(6000), None);
        assert_eq!(monitor.check(6501), Some(2001));
    }

    #[test]
    fn test_ack_sequence_wraparound() {
        let mut monitor = StallMonitor::new(1000, 2);
        let sent = (1u64 << 32) + 500;
        monitor.on_ack(100, sent);
        assert_eq!(monitor.check(sent), None);
        assert_eq!(monitor.check(sent + 1700), Some(2100));
    }
}
