use thiserror::Error;

/// Main error type for the gateway crate
#[derive(Error, Debug)]
pub enum GatewayError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed by the gateway
    #[error("Connection closed (code {code:?}): {reason}")]
    ConnectionClosed { code: Option<u16>, reason: String },

    /// Malformed or unexpected frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Frame (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Setup rejected before any network I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Reconnect attempts exhausted
    #[error("Gateway session is fatal after {attempts} failed attempts: {reason}")]
    Fatal { attempts: usize, reason: String },
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
