pub mod states;

use crate::core::client::{GatewayClient, SessionGuard};
use crate::core::config::{GatewayConfig, DEFAULT_API_VERSION, DEFAULT_HELLO_TIMEOUT};
use crate::core::protocol::ConnectionProperties;
use crate::dispatch::{DispatcherConfig, EventDispatcher};
use crate::traits::*;
use states::*;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Consecutive failed connection attempts tolerated by the default strategy
pub const DEFAULT_MAX_FAILED_ATTEMPTS: usize = 3;

/// Type-state builder for `GatewayClient`
///
/// The gateway URL and the bot token are mandatory; `build()` only exists
/// once both are set.
pub struct GatewayClientBuilder<U, T>
where
    U: UrlState,
    T: TokenState,
{
    _state: TypeState<U, T>,
    url: Option<String>,
    token: Option<String>,
    intents: u64,
    api_version: u8,
    properties: ConnectionProperties,
    hello_timeout: Duration,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    dispatcher: Option<Arc<EventDispatcher>>,
    dispatcher_config: DispatcherConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl GatewayClientBuilder<NoUrl, NoToken> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            token: None,
            intents: 0,
            api_version: DEFAULT_API_VERSION,
            properties: ConnectionProperties::default(),
            hello_timeout: DEFAULT_HELLO_TIMEOUT,
            reconnect_strategy: None,
            dispatcher: None,
            dispatcher_config: DispatcherConfig::default(),
            shutdown_flag: None,
        }
    }
}

impl Default for GatewayClientBuilder<NoUrl, NoToken> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, T> GatewayClientBuilder<U, T>
where
    U: UrlState,
    T: TokenState,
{
    fn transition<U2: UrlState, T2: TokenState>(self) -> GatewayClientBuilder<U2, T2> {
        GatewayClientBuilder {
            _state: TypeState::new(),
            url: self.url,
            token: self.token,
            intents: self.intents,
            api_version: self.api_version,
            properties: self.properties,
            hello_timeout: self.hello_timeout,
            reconnect_strategy: self.reconnect_strategy,
            dispatcher: self.dispatcher,
            dispatcher_config: self.dispatcher_config,
            shutdown_flag: self.shutdown_flag,
        }
    }

    pub fn intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    pub fn api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Time allowed between socket open and HELLO
    pub fn hello_timeout(mut self, timeout: Duration) -> Self {
        self.hello_timeout = timeout;
        self
    }

    /// Defaults to exponential backoff from 1s to 30s, 3 consecutive failures
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Use an existing dispatcher (listeners may already be registered)
    pub fn dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Pool sizing when the builder creates the dispatcher itself
    pub fn dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher_config = config;
        self
    }

    /// Share a shutdown flag with other components
    ///
    /// Setting the flag to `true` stops the client before its next
    /// connection attempt and ends the current connection loop.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

// URL setting
impl<T: TokenState> GatewayClientBuilder<NoUrl, T> {
    /// Gateway URL, usually from `GET gateway`
    pub fn url(mut self, url: impl Into<String>) -> GatewayClientBuilder<HasUrl, T> {
        self.url = Some(url.into());
        self.transition()
    }
}

// Token setting
impl<U: UrlState> GatewayClientBuilder<U, NoToken> {
    pub fn token(mut self, token: impl Into<String>) -> GatewayClientBuilder<U, HasToken> {
        self.token = Some(token.into());
        self.transition()
    }
}

// Build method - only available when all required fields are set
impl GatewayClientBuilder<HasUrl, HasToken> {
    /// Validate the configuration and start the client task
    ///
    /// Fails with a configuration error, before any network I/O, when the
    /// URL or token is empty or another client is already running.
    pub async fn build(self) -> Result<GatewayClient> {
        let url = self.url.unwrap_or_default();
        let token = self.token.unwrap_or_default();

        if url.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "gateway URL must not be empty".to_string(),
            ));
        }
        if token.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "bot token must not be empty".to_string(),
            ));
        }

        let guard = SessionGuard::acquire()?;

        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => EventDispatcher::new(self.dispatcher_config)?,
        };

        let reconnect_strategy = self.reconnect_strategy.unwrap_or_else(|| {
            Box::new(ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(30),
                Some(DEFAULT_MAX_FAILED_ATTEMPTS),
            ))
        });

        let config = GatewayConfig {
            url,
            token,
            intents: self.intents,
            api_version: self.api_version,
            properties: self.properties,
            hello_timeout: self.hello_timeout,
            reconnect_strategy,
            dispatcher,
            shutdown_flag: self
                .shutdown_flag
                .unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        };

        GatewayClient::start(config, guard)
    }
}
