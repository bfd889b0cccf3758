//! Lock-free gateway state and counters

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Gateway session lifecycle
///
/// ```text
/// Disconnected -> Handshaking -> Identified -> Steady
///                                   Steady -> Resuming | Reidentifying -> Steady
///                                   any    -> Fatal (retry cap reached)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GatewayState {
    Disconnected = 0,
    Handshaking = 1,
    Identified = 2,
    Steady = 3,
    Resuming = 4,
    Reidentifying = 5,
    ShuttingDown = 6,
    Fatal = 7,
}

impl GatewayState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => GatewayState::Handshaking,
            2 => GatewayState::Identified,
            3 => GatewayState::Steady,
            4 => GatewayState::Resuming,
            5 => GatewayState::Reidentifying,
            6 => GatewayState::ShuttingDown,
            7 => GatewayState::Fatal,
            _ => GatewayState::Disconnected,
        }
    }
}

/// Atomic wrapper around [`GatewayState`]
#[derive(Debug)]
pub struct AtomicGatewayState {
    inner: AtomicU8,
}

impl AtomicGatewayState {
    pub fn new(state: GatewayState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> GatewayState {
        GatewayState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: GatewayState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_steady(&self) -> bool {
        self.get() == GatewayState::Steady
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.get() == GatewayState::Fatal
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.get() == GatewayState::ShuttingDown
    }

    /// True while a handshake (fresh or resume) is in progress
    #[inline]
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self.get(),
            GatewayState::Handshaking
                | GatewayState::Identified
                | GatewayState::Resuming
                | GatewayState::Reidentifying
        )
    }
}

/// Connection counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    heartbeats_sent: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_heartbeats(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}
