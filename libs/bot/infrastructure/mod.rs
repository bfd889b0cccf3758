//! Configuration and logging

pub mod config;
pub mod logging;

pub use config::{BotConfig, ConfigError, DeclaredCommand, DeclaredOption};
pub use logging::init_tracing;
