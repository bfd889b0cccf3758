//! Event handler traits
//!
//! Handlers run on dispatcher worker threads, never on the socket task. They
//! are fire-and-forget: a handler that returns `Some(value)` is reported as a
//! usage error (logged as a warning) and the value is only kept on the job
//! record.
//!
//! # Example
//!
//! ```ignore
//! let listener = Listener::on_event("MESSAGE_CREATE", |ctx| {
//!     tracing::info!("message in {}", ctx.data()["channel_id"]);
//!     None
//! });
//! dispatcher.register(listener);
//! ```

use crate::core::protocol::GatewayFrame;
use crate::dispatch::JobId;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// What a handler sees for one dispatched frame
#[derive(Debug, Clone)]
pub struct EventContext {
    frame: Arc<GatewayFrame>,
    job_id: JobId,
    received_at: Instant,
}

impl EventContext {
    pub(crate) fn new(frame: Arc<GatewayFrame>, job_id: JobId, received_at: Instant) -> Self {
        Self {
            frame,
            job_id,
            received_at,
        }
    }

    pub fn frame(&self) -> &GatewayFrame {
        &self.frame
    }

    pub fn op(&self) -> u8 {
        self.frame.op
    }

    /// Dispatch event name (`t`), empty for non-dispatch frames
    pub fn event_name(&self) -> &str {
        self.frame.event_name()
    }

    /// Event payload (`d`)
    pub fn data(&self) -> &Value {
        &self.frame.d
    }

    pub fn seq(&self) -> Option<u64> {
        self.frame.s
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// When the frame was read off the socket
    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// Application listener handler
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event. Must return `None`.
    fn handle(&self, ctx: &EventContext) -> Option<Value>;
}

impl<F> EventHandler for F
where
    F: Fn(&EventContext) -> Option<Value> + Send + Sync + 'static,
{
    fn handle(&self, ctx: &EventContext) -> Option<Value> {
        self(ctx)
    }
}

/// Built-in handler for a reserved dispatch event
///
/// Runs when no application listener claims the event, always as a priority
/// job (a fresh worker even when the pool is saturated).
pub trait SystemEventHandler: Send + Sync + 'static {
    /// The dispatch event name (`t`) this handler owns
    fn event(&self) -> &str;

    fn handle(&self, ctx: &EventContext) -> Option<Value>;
}
