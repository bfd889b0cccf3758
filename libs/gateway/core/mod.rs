//! Gateway connection core
//!
//! ## Example
//!
//! ```rust,ignore
//! use inkcord_gateway::{builder, ClientEvent, Listener};
//!
//! #[tokio::main]
//! async fn main() -> inkcord_gateway::Result<()> {
//!     let client = builder()
//!         .url("wss://gateway.discord.gg")
//!         .token(std::env::var("BOT_TOKEN").unwrap_or_default())
//!         .intents(1 << 0 | 1 << 9)
//!         .build()
//!         .await?;
//!
//!     client.dispatcher().register(Listener::on_event("MESSAGE_CREATE", |ctx| {
//!         println!("message: {}", ctx.data()["content"]);
//!         None
//!     }));
//!
//!     while let Ok(event) = client.recv_event() {
//!         if let ClientEvent::Fatal { .. } = event {
//!             break;
//!         }
//!     }
//!
//!     client.shutdown().await
//! }
//! ```

pub mod ack_tracker;
pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod protocol;
pub mod session;

// Re-export main types
pub use ack_tracker::AckTracker;
pub use builder::{states, GatewayClientBuilder, DEFAULT_MAX_FAILED_ATTEMPTS};
pub use client::{ClientEvent, GatewayClient, Metrics, SessionGuard};
pub use config::GatewayConfig;
pub use connection_state::{AtomicGatewayState, AtomicMetrics, GatewayState};
pub use heartbeat::HeartbeatSchedule;
pub use protocol::{ConnectionProperties, GatewayFrame};
pub use session::{Disconnect, ReconnectPlan, Session};

/// Create a new gateway client builder
pub fn builder() -> GatewayClientBuilder<states::NoUrl, states::NoToken> {
    GatewayClientBuilder::new()
}
