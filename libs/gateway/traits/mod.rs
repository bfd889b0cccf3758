//! Core traits and types shared across the gateway crate
//!
//! - **EventHandler**: application listener callbacks
//! - **SystemEventHandler**: built-in handlers for reserved events
//! - **ReconnectionStrategy**: pacing and cap for reconnect attempts
//! - **GatewayError**: the crate error type

pub mod error;
pub mod handler;
pub mod reconnect;

pub use error::{GatewayError, Result};
pub use handler::{EventContext, EventHandler, SystemEventHandler};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
