//! Typed `INTERACTION_CREATE` payload

use super::snowflake::Snowflake;
use serde::Deserialize;
use serde_json::Value;

/// Interaction type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
    Unknown(u8),
}

impl From<u8> for InteractionKind {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::Autocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    id: Snowflake,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

impl User {
    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Display name, falling back to the username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Member {
    #[serde(default)]
    user: Option<User>,
}

/// One option value supplied with a command
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionOption {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    options: Vec<InteractionOption>,
}

impl InteractionOption {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Option type code
    pub fn kind(&self) -> u8 {
        self.kind
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Nested options of a subcommand
    pub fn options(&self) -> &[InteractionOption] {
        &self.options
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CommandData {
    id: Snowflake,
    name: String,
    #[serde(default)]
    options: Vec<InteractionOption>,
}

/// A received interaction, built once when the event is decoded
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    id: Snowflake,
    application_id: Snowflake,
    #[serde(rename = "type")]
    kind: InteractionKind,
    token: String,
    #[serde(default)]
    data: Option<CommandData>,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    channel_id: Option<Snowflake>,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    user: Option<User>,
}

impl Interaction {
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn application_id(&self) -> Snowflake {
        self.application_id
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    /// Continuation token for responding
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn command_id(&self) -> Option<Snowflake> {
        self.data.as_ref().map(|data| data.id)
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().map(|data| data.name.as_str())
    }

    pub fn options(&self) -> &[InteractionOption] {
        self.data
            .as_ref()
            .map(|data| data.options.as_slice())
            .unwrap_or_default()
    }

    /// Value of a top-level option by name
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options()
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| option.value.as_ref())
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    pub fn channel_id(&self) -> Option<Snowflake> {
        self.channel_id
    }

    /// The invoking user, from the guild member in guilds or `user` in DMs
    pub fn user(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|member| member.user.as_ref())
            .or(self.user.as_ref())
    }
}
