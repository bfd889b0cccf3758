//! Create locally declared commands that the vendor does not know yet

use crate::domain::{CommandScope, PendingCommand, RegisteredCommand, Snowflake};
use crate::error::{BotError, Result};
use crate::infrastructure::ConfigError;
use async_trait::async_trait;
use inkcord_rest::{RestClient, RestRequest};
use serde_json::Value;
use tracing::{debug, info};

/// Remote command collections
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// Commands registered in one scope
    async fn fetch_registered(
        &self,
        application_id: Snowflake,
        scope: CommandScope,
    ) -> Result<Vec<RegisteredCommand>>;

    /// Create one command from its payload
    async fn create(
        &self,
        application_id: Snowflake,
        scope: CommandScope,
        payload: Value,
    ) -> Result<RegisteredCommand>;
}

/// `CommandApi` over the REST transport
#[derive(Clone)]
pub struct RestCommandApi {
    rest: RestClient,
}

impl RestCommandApi {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl CommandApi for RestCommandApi {
    async fn fetch_registered(
        &self,
        application_id: Snowflake,
        scope: CommandScope,
    ) -> Result<Vec<RegisteredCommand>> {
        let request = RestRequest::get(scope.route(application_id))?;
        let registered: Vec<RegisteredCommand> = self.rest.send(request).await?.json()?;
        Ok(registered
            .into_iter()
            .map(|command| command.in_scope(scope))
            .collect())
    }

    async fn create(
        &self,
        application_id: Snowflake,
        scope: CommandScope,
        payload: Value,
    ) -> Result<RegisteredCommand> {
        let request = RestRequest::post(scope.route(application_id), payload)?;
        let created: RegisteredCommand = self.rest.send(request).await?.json()?;
        Ok(created.in_scope(scope))
    }
}

/// What a sync run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Created commands, by scope and name
    pub created: Vec<(CommandScope, String)>,
    /// Local commands already registered
    pub unchanged: usize,
}

pub struct CommandSync<A> {
    api: A,
}

impl<A: CommandApi> CommandSync<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Local commands with no registered counterpart of the same name and scope
    pub fn missing<'a>(
        local: &'a [PendingCommand],
        registered: &[RegisteredCommand],
    ) -> Vec<&'a PendingCommand> {
        local
            .iter()
            .filter(|command| {
                !registered.iter().any(|known| {
                    known.name() == command.name() && known.scope() == command.scope()
                })
            })
            .collect()
    }

    /// Create every local command absent from `registered`
    pub async fn sync(
        &self,
        application_id: Option<Snowflake>,
        local: &[PendingCommand],
        registered: &[RegisteredCommand],
    ) -> Result<SyncReport> {
        let application_id = Self::check(application_id, local)?;

        let missing = Self::missing(local, registered);
        let mut report = SyncReport {
            created: Vec::with_capacity(missing.len()),
            unchanged: local.len() - missing.len(),
        };

        for command in missing {
            info!("Creating {} command '{}'", command.scope(), command.name());
            self.api
                .create(application_id, command.scope(), command.payload())
                .await?;
            report
                .created
                .push((command.scope(), command.name().to_string()));
        }

        info!(
            "Command sync done: {} created, {} unchanged",
            report.created.len(),
            report.unchanged
        );
        Ok(report)
    }

    /// Fetch the registered set of every scope in use, then sync against it
    pub async fn sync_remote(
        &self,
        application_id: Option<Snowflake>,
        local: &[PendingCommand],
    ) -> Result<SyncReport> {
        let app = Self::check(application_id, local)?;

        let mut scopes: Vec<CommandScope> = Vec::new();
        for command in local {
            if !scopes.contains(&command.scope()) {
                scopes.push(command.scope());
            }
        }

        let mut registered = Vec::new();
        for scope in scopes {
            let fetched = self.api.fetch_registered(app, scope).await?;
            debug!("{} commands registered in {}", fetched.len(), scope);
            registered.extend(fetched);
        }

        self.sync(Some(app), local, &registered).await
    }

    /// Configuration checks that must pass before any network call
    fn check(application_id: Option<Snowflake>, local: &[PendingCommand]) -> Result<Snowflake> {
        let application_id = application_id.ok_or_else(|| {
            BotError::Configuration(ConfigError::ValidationError(
                "application id is unknown until READY".to_string(),
            ))
        })?;
        for command in local {
            command.validate()?;
        }
        Ok(application_id)
    }
}
