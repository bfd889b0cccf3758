//! Heartbeat ACK tracker
//!
//! Tracks HEARTBEAT_ACK (op 11) frames to detect zombie connections. A beat
//! that comes due while the previous one is still unacknowledged means the
//! gateway stopped answering and the connection must be recycled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks heartbeat acknowledgements
///
/// Timestamps are stored as milliseconds since an internal epoch (offset by
/// one so zero means "never") to allow lock-free reads from other tasks.
/// They only feed `latency`; whether a beat is outstanding is a flag.
pub struct AckTracker {
    epoch: Instant,
    awaiting_ack: AtomicBool,
    last_beat_sent_ms: AtomicU64,
    last_ack_received_ms: AtomicU64,
}

impl AckTracker {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            awaiting_ack: AtomicBool::new(false),
            last_beat_sent_ms: AtomicU64::new(0),
            last_ack_received_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    pub fn record_beat_sent(&self) {
        self.last_beat_sent_ms.store(self.now_ms(), Ordering::Release);
        self.awaiting_ack.store(true, Ordering::Release);
    }

    pub fn record_ack(&self) {
        self.last_ack_received_ms
            .store(self.now_ms(), Ordering::Release);
        self.awaiting_ack.store(false, Ordering::Release);
    }

    /// True when no beat is outstanding
    ///
    /// Called right before sending the next beat: an outstanding beat at
    /// that point has gone a full interval without an ACK.
    pub fn is_acknowledged(&self) -> bool {
        !self.awaiting_ack.load(Ordering::Acquire)
    }

    /// Round trip of the last acknowledged beat
    pub fn latency(&self) -> Option<Duration> {
        let sent = self.last_beat_sent_ms.load(Ordering::Acquire);
        let acked = self.last_ack_received_ms.load(Ordering::Acquire);
        if sent == 0 || acked < sent || self.awaiting_ack.load(Ordering::Acquire) {
            return None;
        }
        Some(Duration::from_millis(acked - sent))
    }

    pub fn time_since_last_ack(&self) -> Option<Duration> {
        let acked = self.last_ack_received_ms.load(Ordering::Acquire);
        if acked == 0 {
            return None;
        }
        Some(Duration::from_millis(self.now_ms().saturating_sub(acked)))
    }

    /// Reset for a new connection
    pub fn reset(&self) {
        self.awaiting_ack.store(false, Ordering::Release);
        self.last_beat_sent_ms.store(0, Ordering::Release);
        self.last_ack_received_ms.store(0, Ordering::Release);
    }
}

impl Default for AckTracker {
    fn default() -> Self {
        Self::new()
    }
}
