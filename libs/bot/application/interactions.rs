//! Built-in routing of `INTERACTION_CREATE` to command handlers

use super::registry::CommandRegistry;
use crate::domain::{Interaction, InteractionKind};
use crate::error::{BotError, Result};
use inkcord_gateway::protocol::event;
use inkcord_gateway::{EventContext, SystemEventHandler};
use inkcord_rest::{RestClient, RestResponse};
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

/// Interaction response type for a channel message
pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

/// Everything a command handler gets for one invocation
///
/// Handlers run on worker threads; `reply` blocks the worker until the
/// response has been sent.
pub struct InteractionContext {
    interaction: Interaction,
    rest: RestClient,
    runtime: Handle,
}

impl InteractionContext {
    pub fn new(interaction: Interaction, rest: RestClient, runtime: Handle) -> Self {
        Self {
            interaction,
            rest,
            runtime,
        }
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.interaction.option(name)
    }

    /// Answer with a plain message
    pub fn reply(&self, content: impl Into<String>) -> Result<RestResponse> {
        self.respond(json!({
            "type": CHANNEL_MESSAGE_WITH_SOURCE,
            "data": { "content": content.into() },
        }))
    }

    /// Answer with a raw interaction response body
    pub fn respond(&self, body: Value) -> Result<RestResponse> {
        let id = self.interaction.id().to_string();
        let token = self.interaction.token();
        let response = self
            .runtime
            .block_on(self.rest.create_interaction_response(&id, token, body))?;
        Ok(response)
    }
}

/// System handler that invokes the registered command handler
pub struct InteractionRouter {
    registry: Arc<CommandRegistry>,
    rest: RestClient,
    runtime: OnceLock<Handle>,
}

impl InteractionRouter {
    pub fn new(registry: Arc<CommandRegistry>, rest: RestClient) -> Self {
        Self {
            registry,
            rest,
            runtime: OnceLock::new(),
        }
    }

    /// Runtime used by `InteractionContext::reply`; the first call wins
    pub fn attach_runtime(&self, handle: Handle) {
        let _ = self.runtime.set(handle);
    }

    /// Run the handler for one interaction
    ///
    /// Returns whether a handler ran.
    pub fn route(&self, interaction: Interaction) -> Result<bool> {
        if interaction.kind() != InteractionKind::ApplicationCommand {
            debug!("Ignoring interaction {} of kind {:?}", interaction.id(), interaction.kind());
            return Ok(false);
        }
        let Some(name) = interaction.command_name().map(str::to_string) else {
            warn!("Command interaction {} carries no command data", interaction.id());
            return Ok(false);
        };

        let Some(handler) = self.registry.handler_for(&name, interaction.guild_id()) else {
            warn!("No handler registered for command '{}'", name);
            return Ok(false);
        };

        let runtime = self
            .runtime
            .get()
            .cloned()
            .ok_or_else(|| BotError::NotConnected("no runtime attached to the router".to_string()))?;

        debug!("Running handler for command '{}'", name);
        let ctx = InteractionContext::new(interaction, self.rest.clone(), runtime);
        (*handler)(&ctx)?;
        Ok(true)
    }
}

impl SystemEventHandler for InteractionRouter {
    fn event(&self) -> &str {
        event::INTERACTION_CREATE
    }

    fn handle(&self, ctx: &EventContext) -> Option<Value> {
        match Interaction::from_value(ctx.data()) {
            Ok(interaction) => {
                if let Err(e) = self.route(interaction) {
                    error!("Command handler failed: {}", e);
                }
            }
            Err(e) => warn!("Malformed interaction payload: {}", e),
        }
        None
    }
}
