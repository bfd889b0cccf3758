use crate::domain::CommandError;
use crate::infrastructure::ConfigError;
use inkcord_gateway::GatewayError;
use inkcord_rest::RestError;
use thiserror::Error;

/// Error type for the bot facade
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("REST error: {0}")]
    Rest(#[from] RestError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// No runtime or session to act on yet
    #[error("Not connected: {0}")]
    NotConnected(String),
}

impl From<CommandError> for BotError {
    fn from(e: CommandError) -> Self {
        BotError::Configuration(ConfigError::InvalidCommand(e))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
