use crate::core::protocol::ConnectionProperties;
use crate::dispatch::EventDispatcher;
use crate::traits::ReconnectionStrategy;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Gateway API version requested in the connection URL
pub const DEFAULT_API_VERSION: u8 = 10;

/// How long to wait for HELLO after the socket opens
pub const DEFAULT_HELLO_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for a `GatewayClient`
///
/// Built by the type-state builder; the URL and token are mandatory.
pub struct GatewayConfig {
    /// Gateway URL as returned by `GET gateway` (no query string)
    pub(crate) url: String,

    /// Bot token sent with IDENTIFY and RESUME
    pub(crate) token: String,

    /// Intents bitmask sent with IDENTIFY
    pub(crate) intents: u64,

    pub(crate) api_version: u8,

    pub(crate) properties: ConnectionProperties,

    pub(crate) hello_timeout: Duration,

    /// Pacing and cap for reconnect attempts
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Receives every decoded frame
    pub(crate) dispatcher: Arc<EventDispatcher>,

    /// Set to true to stop the client; checked before every attempt
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl GatewayConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn intents(&self) -> u64 {
        self.intents
    }

    pub fn api_version(&self) -> u8 {
        self.api_version
    }

    pub fn hello_timeout(&self) -> Duration {
        self.hello_timeout
    }

    /// Connection URL with the version and encoding query appended
    pub fn connect_url(&self, base: &str) -> String {
        let separator = if base.contains('?') { "&" } else { "/?" };
        format!(
            "{}{}v={}&encoding=json",
            base.trim_end_matches('/'),
            separator,
            self.api_version
        )
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("api_version", &self.api_version)
            .field("hello_timeout", &self.hello_timeout)
            .finish()
    }
}
