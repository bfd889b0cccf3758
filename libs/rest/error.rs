use thiserror::Error;

/// Error type for REST calls
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Any status >= 400 other than 429
    #[error("API error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Deserialization failed: {0}")]
    Deserialize(String),

    /// A scheduled retry was cancelled before it ran
    #[error("Request cancelled before it was resubmitted")]
    Cancelled,

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RestError {
    /// HTTP status for `Http` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Http { status, .. } => Some(*status),
            RestError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestError>;
