//! Domain records the bot routes on

pub mod command;
pub mod intents;
pub mod interaction;
pub mod snowflake;

pub use command::{
    Attachment, Channel, CommandError, CommandParam, CommandParamType, CommandScope, ParamType,
    PendingCommand, RegisteredCommand, Role,
};
pub use intents::{Intents, UnknownIntent};
pub use interaction::{Interaction, InteractionKind, InteractionOption, User};
pub use snowflake::Snowflake;
