//! # inkcord-gateway
//!
//! WebSocket gateway session for the inkcord chat client.
//!
//! ## Features
//!
//! - **Session state machine**: HELLO / IDENTIFY / RESUME handshake, close-code driven resume or re-identify
//! - **Heartbeats**: jittered first beat on a dedicated task, zombie detection through missing ACKs
//! - **Bounded dispatch**: listeners run on a fixed worker pool with deferral when saturated
//! - **Type-state builder**: a client without URL or token does not compile

pub mod core;
pub mod dispatch;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, protocol,
    builder::{states, GatewayClientBuilder},
    client::{ClientEvent, GatewayClient, Metrics},
    connection_state::GatewayState,
    protocol::GatewayFrame,
    session::{Disconnect, Session},
};

// Re-export dispatch
pub use dispatch::{
    DispatchJob, DispatcherConfig, EventDispatcher, JobHandle, JobId, Listener, ListenerId,
};
