//! inkcord - chat gateway and REST client
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//! - **gateway**: WebSocket session and event dispatch (re-exported from workspace)
//! - **rest**: Rate-limit aware REST transport (re-exported from workspace)
//! - **bot**: Bot facade, commands and configuration (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```ignore
//! use inkcord::bin_common::{load_config_from_env, ConfigType};
//! use inkcord::bot::{Bot, BotConfig};
//! ```

// Re-export workspace libraries for convenience
pub use inkcord_bot as bot;
pub use inkcord_gateway as gateway;
pub use inkcord_rest as rest;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{config_type_from_args, load_config_from_env, parse_args, ConfigType};
    pub use runner::{BinaryRunner, RunConfig};
}
