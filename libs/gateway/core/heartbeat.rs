//! Heartbeat timer for gateway connections
//!
//! # Architecture
//!
//! The heartbeat runs in a dedicated Tokio task so handler backlog or frame
//! decoding can never delay it:
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Heartbeat Task          │
//! │                          │
//! │  1. sleep interval*jitter│
//! │  2. tick ────────────────┼──> mpsc ──> Connection loop ──> {op:1, d:seq}
//! │  3. sleep interval       │
//! │  4. repeat from 2        │
//! └──────────────────────────┘
//! ```
//!
//! The task only produces ticks. The connection loop owns the socket and the
//! sequence number, so it builds and sends the frame and checks that the
//! previous beat was acknowledged.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Beat timing for one connection
///
/// The first beat waits `interval * jitter`; every later beat waits the full
/// interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatSchedule {
    interval: Duration,
    jitter: f64,
}

impl HeartbeatSchedule {
    /// `jitter` outside `[0, 1)` is treated as 0
    pub fn new(interval: Duration, jitter: f64) -> Self {
        let jitter = if (0.0..1.0).contains(&jitter) { jitter } else { 0.0 };
        Self { interval, jitter }
    }

    /// Draw a fresh jitter factor in `[0, 1)`
    pub fn with_random_jitter(interval: Duration) -> Self {
        Self::new(interval, rand::random::<f64>())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn first_delay(&self) -> Duration {
        self.interval.mul_f64(self.jitter)
    }

    /// Delay before beat number `beat` (0-indexed)
    pub fn delay_before(&self, beat: u64) -> Duration {
        if beat == 0 {
            self.first_delay()
        } else {
            self.interval
        }
    }
}

/// Heartbeat task that emits one tick per scheduled beat
///
/// Runs until the shutdown signal fires or the tick receiver is dropped.
pub async fn heartbeat_task(
    schedule: HeartbeatSchedule,
    tick_tx: mpsc::UnboundedSender<u64>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(
        "Heartbeat task started: interval {:?}, first beat in {:?}",
        schedule.interval(),
        schedule.first_delay()
    );

    let mut beat: u64 = 0;
    let mut deadline = tokio::time::Instant::now() + schedule.first_delay();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Heartbeat task received shutdown signal");
                break;
            }
            _ = tokio::time::sleep_until(deadline) => {
                if tick_tx.send(beat).is_err() {
                    debug!("Heartbeat channel closed, shutting down heartbeat task");
                    break;
                }
                beat += 1;
                // Anchored on the previous deadline so beats do not drift
                deadline += schedule.delay_before(beat);
            }
        }
    }

    debug!("Heartbeat task exiting after {} beats", beat);
}

/// Spawn a heartbeat task
///
/// Returns the task handle, the shutdown trigger and the tick receiver.
pub fn spawn_heartbeat(
    schedule: HeartbeatSchedule,
) -> (
    tokio::task::JoinHandle<()>,
    oneshot::Sender<()>,
    mpsc::UnboundedReceiver<u64>,
) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(heartbeat_task(schedule, tick_tx, shutdown_rx));

    (handle, shutdown_tx, tick_rx)
}
