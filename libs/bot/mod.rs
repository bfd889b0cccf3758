//! # inkcord-bot
//!
//! Bot facade over the inkcord gateway and REST crates.
//!
//! ```ignore
//! use inkcord_bot::{Bot, BotConfig, CommandParam, PendingCommand};
//! use inkcord_gateway::Listener;
//!
//! let config = BotConfig::load("config/bot.yaml")?;
//! let builder = Bot::builder(config)?;
//!
//! builder.listener(Listener::on_event("MESSAGE_CREATE", |ctx| {
//!     tracing::info!("message: {}", ctx.data()["content"]);
//!     None
//! }));
//!
//! let echo = PendingCommand::new("echo", "Repeat text")?
//!     .param(CommandParam::of::<String>("text", "What to repeat")?);
//! builder.command(echo, |ctx| {
//!     let text = ctx.option("text").and_then(|v| v.as_str()).unwrap_or_default();
//!     ctx.reply(text)?;
//!     Ok(())
//! })?;
//!
//! builder.build().run().await?;
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{
    Bot, BotBuilder, CommandApi, CommandHandle, CommandRegistry, CommandSync, InteractionContext,
    InteractionRouter, RestCommandApi, SyncReport,
};
pub use domain::{
    CommandError, CommandParam, CommandParamType, CommandScope, Intents, Interaction,
    ParamType, PendingCommand, RegisteredCommand, Snowflake,
};
pub use error::{BotError, Result};
pub use infrastructure::{init_tracing, BotConfig, ConfigError};
