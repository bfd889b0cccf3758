use crate::core::protocol::{opcode, GatewayFrame};
use crate::traits::{EventContext, EventHandler};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Handle returned when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Binds an opcode, and optionally a dispatch event name, to a handler
#[derive(Clone)]
pub struct Listener {
    opcode: u8,
    event: Option<String>,
    handler: Arc<dyn EventHandler>,
}

impl Listener {
    pub fn new(opcode: u8, event: Option<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            opcode,
            event,
            handler,
        }
    }

    /// Listen to every frame with the given opcode
    pub fn on_opcode<F>(op: u8, handler: F) -> Self
    where
        F: Fn(&EventContext) -> Option<Value> + Send + Sync + 'static,
    {
        Self::new(op, None, Arc::new(handler))
    }

    /// Listen to one dispatch event (`op` 0 with a matching `t`)
    pub fn on_event<F>(event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&EventContext) -> Option<Value> + Send + Sync + 'static,
    {
        Self::new(opcode::DISPATCH, Some(event.into()), Arc::new(handler))
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub(crate) fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler)
    }

    pub fn matches(&self, frame: &GatewayFrame) -> bool {
        if self.opcode != frame.op {
            return false;
        }
        match &self.event {
            Some(name) => frame.t.as_deref() == Some(name.as_str()),
            None => true,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("opcode", &self.opcode)
            .field("event", &self.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_listener_matches_only_its_event() {
        let listener = Listener::on_event("MESSAGE_CREATE", |_| None);
        assert!(listener.matches(&GatewayFrame::dispatch("MESSAGE_CREATE", 1, json!({}))));
        assert!(!listener.matches(&GatewayFrame::dispatch("MESSAGE_UPDATE", 2, json!({}))));
        assert!(!listener.matches(&GatewayFrame::new(opcode::HEARTBEAT_ACK, Value::Null)));
    }

    #[test]
    fn test_opcode_listener_matches_every_event() {
        let listener = Listener::on_opcode(opcode::DISPATCH, |_| None);
        assert!(listener.matches(&GatewayFrame::dispatch("MESSAGE_CREATE", 1, json!({}))));
        assert!(listener.matches(&GatewayFrame::dispatch("GUILD_CREATE", 2, json!({}))));
        assert!(!listener.matches(&GatewayFrame::new(opcode::HELLO, Value::Null)));
    }
}
