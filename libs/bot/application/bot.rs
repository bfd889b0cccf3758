//! Bot facade wiring the gateway, dispatcher, REST client and commands

use super::interactions::{InteractionContext, InteractionRouter};
use super::registry::{CommandHandle, CommandRegistry};
use super::sync::{CommandSync, RestCommandApi, SyncReport};
use crate::domain::{PendingCommand, Snowflake};
use crate::error::{BotError, Result};
use crate::infrastructure::{BotConfig, ConfigError};
use inkcord_gateway::{ClientEvent, EventDispatcher, GatewayClient, GatewayError, Listener, ListenerId};
use inkcord_rest::RestClient;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often the run loop drains client events
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Collects listeners and commands before the bot connects
pub struct BotBuilder {
    config: BotConfig,
    dispatcher: Arc<EventDispatcher>,
    registry: Arc<CommandRegistry>,
    rest: RestClient,
    router: Arc<InteractionRouter>,
}

impl BotBuilder {
    /// Validate the config and set up the dispatcher and REST client
    ///
    /// Commands declared in the config are registered without handlers;
    /// attach them with [`BotBuilder::handle`].
    pub fn new(config: BotConfig) -> Result<Self> {
        config.validate()?;

        let rest = RestClient::with_config(&config.token, config.rest_config())?;
        let dispatcher = EventDispatcher::new(config.dispatcher_config())?;
        let registry = Arc::new(CommandRegistry::new());
        for command in config.declared_commands()? {
            registry.declare(command)?;
        }

        let router = Arc::new(InteractionRouter::new(Arc::clone(&registry), rest.clone()));
        dispatcher.register_system(router.clone());

        Ok(Self {
            config,
            dispatcher,
            registry,
            rest,
            router,
        })
    }

    /// Register an event listener
    pub fn listener(&self, listener: Listener) -> ListenerId {
        self.dispatcher.register(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.unregister(id)
    }

    /// Register a command with its handler
    pub fn command<F>(&self, command: PendingCommand, handler: F) -> Result<CommandHandle>
    where
        F: Fn(&InteractionContext) -> Result<()> + Send + Sync + 'static,
    {
        Ok(self.registry.register(command, handler)?)
    }

    /// Attach a handler to a command declared in the config
    pub fn handle<F>(&self, name: &str, handler: F) -> Result<Vec<CommandHandle>>
    where
        F: Fn(&InteractionContext) -> Result<()> + Send + Sync + 'static,
    {
        Ok(self.registry.attach(name, handler)?)
    }

    pub fn remove_command(&self, handle: CommandHandle) -> bool {
        self.registry.unregister(handle)
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn build(self) -> Bot {
        let application_id = self.config.application_id;
        Bot {
            config: self.config,
            dispatcher: self.dispatcher,
            registry: self.registry,
            rest: self.rest,
            router: self.router,
            application_id: Arc::new(Mutex::new(application_id)),
            connected: AtomicBool::new(false),
            synced: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A configured bot, ready to connect
pub struct Bot {
    config: BotConfig,
    dispatcher: Arc<EventDispatcher>,
    registry: Arc<CommandRegistry>,
    rest: RestClient,
    router: Arc<InteractionRouter>,
    application_id: Arc<Mutex<Option<Snowflake>>>,
    /// Set while the gateway session is READY or RESUMED
    connected: AtomicBool,
    synced: Arc<AtomicBool>,
}

impl Bot {
    pub fn builder(config: BotConfig) -> Result<BotBuilder> {
        BotBuilder::new(config)
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Application id from the environment or the last READY
    pub fn application_id(&self) -> Option<Snowflake> {
        *self.application_id.lock()
    }

    pub fn commands(&self) -> Vec<PendingCommand> {
        self.registry.commands()
    }

    /// Whether the gateway session is currently established
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Create registered commands the vendor does not know yet
    ///
    /// Only valid while connected; before that it is a configuration error
    /// and nothing is sent.
    pub async fn sync_commands(&self) -> Result<SyncReport> {
        if !self.is_connected() {
            return Err(BotError::Configuration(ConfigError::ValidationError(
                "command sync requires an established gateway session".to_string(),
            )));
        }
        CommandSync::new(RestCommandApi::new(self.rest.clone()))
            .sync_remote(self.application_id(), &self.registry.commands())
            .await
    }

    /// Run until Ctrl-C or a fatal gateway error
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes or the gateway session turns fatal
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.router.attach_runtime(Handle::current());

        let url = match &self.config.gateway.url {
            Some(url) => url.clone(),
            None => self.rest.get_gateway_url().await?,
        };
        let intents = self.config.intents()?;
        info!("Connecting to {} with intents {}", url, intents);

        let client = inkcord_gateway::builder()
            .url(url)
            .token(self.config.token.clone())
            .intents(intents.bits())
            .api_version(self.config.gateway.api_version)
            .hello_timeout(self.config.hello_timeout())
            .reconnect_strategy(self.config.reconnect_strategy())
            .dispatcher(Arc::clone(&self.dispatcher))
            .build()
            .await?;

        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);
        let mut sync_task: Option<JoinHandle<()>> = None;

        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Some(result) = self.drain_events(&client, &mut sync_task) {
                        break result;
                    }
                }
            }
        };

        self.connected.store(false, Ordering::Release);
        if let Some(task) = sync_task {
            task.abort();
        }
        let cancelled = self.rest.cancel_pending();
        if cancelled > 0 {
            debug!("Cancelled {} pending REST requests", cancelled);
        }
        client.shutdown().await?;
        info!("Bot stopped");
        outcome
    }

    /// Handle queued client events; `Some` ends the run loop
    fn drain_events(
        &self,
        client: &GatewayClient,
        sync_task: &mut Option<JoinHandle<()>>,
    ) -> Option<Result<()>> {
        while let Some(event) = client.try_recv_event() {
            match event {
                ClientEvent::Connected => debug!("Gateway socket open"),
                ClientEvent::Ready {
                    session_id,
                    application_id,
                } => {
                    info!("Ready (session {})", session_id);
                    self.on_ready(application_id.as_deref(), sync_task);
                }
                ClientEvent::Resumed => {
                    info!("Session resumed");
                    self.connected.store(true, Ordering::Release);
                }
                ClientEvent::Disconnected(reason) => {
                    warn!("Gateway disconnected: {:?}", reason);
                    self.connected.store(false, Ordering::Release);
                }
                ClientEvent::Reconnecting(failures) => {
                    info!("Reconnecting ({} consecutive failures)", failures)
                }
                ClientEvent::Error(message) => warn!("Gateway error: {}", message),
                ClientEvent::Fatal { attempts, reason } => {
                    error!("Gateway session is fatal: {}", reason);
                    return Some(Err(BotError::Gateway(GatewayError::Fatal {
                        attempts,
                        reason,
                    })));
                }
            }
        }
        None
    }

    fn on_ready(&self, application_id: Option<&str>, sync_task: &mut Option<JoinHandle<()>>) {
        self.connected.store(true, Ordering::Release);
        if let Some(raw) = application_id {
            match raw.parse::<Snowflake>() {
                Ok(id) => *self.application_id.lock() = Some(id),
                Err(_) => warn!("READY carried a malformed application id '{}'", raw),
            }
        }

        if !self.config.commands.sync_on_ready || self.registry.is_empty() {
            return;
        }
        if self.synced.swap(true, Ordering::SeqCst) {
            return;
        }

        let sync = CommandSync::new(RestCommandApi::new(self.rest.clone()));
        let application_id = self.application_id();
        let commands = self.registry.commands();
        let synced = Arc::clone(&self.synced);
        *sync_task = Some(tokio::spawn(async move {
            match sync.sync_remote(application_id, &commands).await {
                Ok(report) => info!(
                    "Commands synced: {} created, {} unchanged",
                    report.created.len(),
                    report.unchanged
                ),
                Err(e) => {
                    error!("Command sync failed: {}", e);
                    synced.store(false, Ordering::SeqCst);
                }
            }
        }));
    }
}
