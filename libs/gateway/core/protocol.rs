//! Gateway wire protocol
//!
//! JSON frames `{op, d, s, t}` exchanged over the WebSocket, the opcodes the
//! client understands, and builders for the frames it sends.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Gateway opcodes
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Dispatch event names the session itself reacts to
pub mod event {
    pub const READY: &str = "READY";
    pub const RESUMED: &str = "RESUMED";
    pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";
}

/// A decoded gateway frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: Value,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayFrame {
    pub fn new(op: u8, d: Value) -> Self {
        Self {
            op,
            d,
            s: None,
            t: None,
        }
    }

    /// Build a dispatch frame (op 0)
    pub fn dispatch(event: impl Into<String>, seq: u64, d: Value) -> Self {
        Self {
            op: opcode::DISPATCH,
            d,
            s: Some(seq),
            t: Some(event.into()),
        }
    }

    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Event name, or the empty string for non-dispatch frames
    pub fn event_name(&self) -> &str {
        self.t.as_deref().unwrap_or("")
    }

    pub fn is_dispatch(&self, name: &str) -> bool {
        self.op == opcode::DISPATCH && self.t.as_deref() == Some(name)
    }
}

/// `d` of a HELLO frame
#[derive(Debug, Clone, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyApplication {
    pub id: String,
}

/// The fields of READY the session keeps
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub resume_gateway_url: String,
    #[serde(default)]
    pub application: Option<ReadyApplication>,
    #[serde(default)]
    pub v: Option<u8>,
}

/// Client properties sent with IDENTIFY
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "inkcord".to_string(),
            device: "inkcord".to_string(),
        }
    }
}

pub fn identify(token: &str, intents: u64, properties: &ConnectionProperties) -> GatewayFrame {
    GatewayFrame::new(
        opcode::IDENTIFY,
        json!({
            "token": token,
            "properties": properties,
            "compress": false,
            "intents": intents,
        }),
    )
}

pub fn resume(token: &str, session_id: &str, seq: Option<u64>) -> GatewayFrame {
    GatewayFrame::new(
        opcode::RESUME,
        json!({
            "token": token,
            "session_id": session_id,
            "seq": seq,
        }),
    )
}

pub fn heartbeat(seq: Option<u64>) -> GatewayFrame {
    GatewayFrame::new(opcode::HEARTBEAT, json!(seq))
}

/// Close codes after which a RESUME may be attempted
///
/// 4003 (not authenticated) only counts when the session had identified.
pub fn is_resumable_close(code: u16, identified: bool) -> bool {
    match code {
        4000 | 4001 | 4002 | 4005 | 4007 | 4008 | 4009 => true,
        4003 => identified,
        // 1000/1001 invalidate the session; other transport-level codes keep it.
        1000 | 1001 => false,
        4004 | 4010..=4014 => false,
        _ => code < 4000,
    }
}

/// Close codes the vendor documents as "do not reconnect"
pub fn is_unrecoverable_close(code: u16) -> bool {
    matches!(code, 4004 | 4010..=4014)
}
