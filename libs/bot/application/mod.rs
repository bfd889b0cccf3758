//! Application services: command registry, command sync, interaction
//! routing and the `Bot` facade

pub mod bot;
pub mod interactions;
pub mod registry;
pub mod sync;

pub use bot::{Bot, BotBuilder};
pub use interactions::{InteractionContext, InteractionRouter};
pub use registry::{CommandHandle, CommandHandler, CommandRegistry};
pub use sync::{CommandApi, CommandSync, RestCommandApi, SyncReport};
