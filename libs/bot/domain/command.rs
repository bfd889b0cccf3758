//! Slash command declarations and their wire shape

use super::interaction::User;
use super::snowflake::Snowflake;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 100;
pub const MAX_OPTIONS: usize = 25;

/// Chat-input command type code
pub const CHAT_INPUT: u8 = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid command or option name '{0}': expected 1-32 letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("invalid description for '{0}': expected 1-100 characters")]
    InvalidDescription(String),

    #[error("unknown option type '{0}'")]
    UnknownType(String),

    #[error("command '{command}' declares option '{option}' twice")]
    DuplicateOption { command: String, option: String },

    #[error("command '{command}': required option '{option}' follows an optional one")]
    RequiredAfterOptional { command: String, option: String },

    #[error("command '{0}' has more than 25 options")]
    TooManyOptions(String),

    #[error("command '{0}' is already registered in this scope")]
    Duplicate(String),

    #[error("no declared command named '{0}'")]
    NotDeclared(String),
}

/// Option type codes understood by the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl ParamType {
    pub const fn code(self) -> u8 {
        match self {
            Self::SubCommand => 1,
            Self::SubCommandGroup => 2,
            Self::String => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
            Self::Mentionable => 9,
            Self::Number => 10,
            Self::Attachment => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            _ => return None,
        })
    }

    /// Parse a type name used in config files
    pub fn from_name(name: &str) -> Result<Self, CommandError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "boolean" => Ok(Self::Boolean),
            "number" => Ok(Self::Number),
            "user" => Ok(Self::User),
            "channel" => Ok(Self::Channel),
            "role" => Ok(Self::Role),
            "mentionable" => Ok(Self::Mentionable),
            "attachment" => Ok(Self::Attachment),
            _ => Err(CommandError::UnknownType(name.to_string())),
        }
    }
}

/// A resolved channel reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(pub Snowflake);

/// A resolved role reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role(pub Snowflake);

/// A resolved attachment reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment(pub Snowflake);

/// Maps a Rust type onto a command option type
///
/// `Option<T>` marks the option as not required.
pub trait CommandParamType {
    const PARAM_TYPE: ParamType;
    const REQUIRED: bool = true;
}

impl CommandParamType for String {
    const PARAM_TYPE: ParamType = ParamType::String;
}

impl CommandParamType for i64 {
    const PARAM_TYPE: ParamType = ParamType::Integer;
}

impl CommandParamType for bool {
    const PARAM_TYPE: ParamType = ParamType::Boolean;
}

impl CommandParamType for f64 {
    const PARAM_TYPE: ParamType = ParamType::Number;
}

impl CommandParamType for User {
    const PARAM_TYPE: ParamType = ParamType::User;
}

impl CommandParamType for Channel {
    const PARAM_TYPE: ParamType = ParamType::Channel;
}

impl CommandParamType for Role {
    const PARAM_TYPE: ParamType = ParamType::Role;
}

impl CommandParamType for Attachment {
    const PARAM_TYPE: ParamType = ParamType::Attachment;
}

impl<T: CommandParamType> CommandParamType for Option<T> {
    const PARAM_TYPE: ParamType = T::PARAM_TYPE;
    const REQUIRED: bool = false;
}

/// Check a command or option name
pub fn validate_name(name: &str) -> Result<(), CommandError> {
    let len = name.chars().count();
    let valid_chars = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if len == 0 || len > MAX_NAME_LEN || !valid_chars {
        return Err(CommandError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn validate_description(owner: &str, description: &str) -> Result<(), CommandError> {
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        return Err(CommandError::InvalidDescription(owner.to_string()));
    }
    Ok(())
}

/// One command option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParam {
    name: String,
    description: String,
    kind: ParamType,
    required: bool,
}

impl CommandParam {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParamType,
        required: bool,
    ) -> Result<Self, CommandError> {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;
        Ok(Self {
            name,
            description,
            kind,
            required,
        })
    }

    /// Option typed by a Rust type
    pub fn of<T: CommandParamType>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, CommandError> {
        Self::new(name, description, T::PARAM_TYPE, T::REQUIRED)
    }

    /// Option typed by a config type name
    pub fn from_type_name(
        name: impl Into<String>,
        description: impl Into<String>,
        type_name: &str,
        required: bool,
    ) -> Result<Self, CommandError> {
        Self::new(name, description, ParamType::from_name(type_name)?, required)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ParamType {
        self.kind
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn payload(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "type": self.kind.code(),
            "required": self.required,
        })
    }
}

/// Where a command is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    Global,
    Guild(Snowflake),
}

impl CommandScope {
    /// Collection route for this scope
    pub fn route(self, application_id: Snowflake) -> String {
        match self {
            Self::Global => format!("applications/{}/commands", application_id),
            Self::Guild(guild) => {
                format!("applications/{}/guilds/{}/commands", application_id, guild)
            }
        }
    }
}

impl fmt::Display for CommandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Guild(guild) => write!(f, "guild {}", guild),
        }
    }
}

/// A locally declared command, synced to the vendor when absent there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    name: String,
    description: String,
    private: Option<Snowflake>,
    params: Vec<CommandParam>,
}

impl PendingCommand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self, CommandError> {
        let name = name.into();
        let description = description.into();
        validate_name(&name)?;
        validate_description(&name, &description)?;
        Ok(Self {
            name,
            description,
            private: None,
            params: Vec::new(),
        })
    }

    /// Limit the command to one guild
    pub fn private(mut self, guild: Snowflake) -> Self {
        self.private = Some(guild);
        self
    }

    pub fn param(mut self, param: CommandParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn guild(&self) -> Option<Snowflake> {
        self.private
    }

    pub fn scope(&self) -> CommandScope {
        self.private.map_or(CommandScope::Global, CommandScope::Guild)
    }

    pub fn params(&self) -> &[CommandParam] {
        &self.params
    }

    /// Check the option list as a whole
    pub fn validate(&self) -> Result<(), CommandError> {
        validate_name(&self.name)?;
        validate_description(&self.name, &self.description)?;
        if self.params.len() > MAX_OPTIONS {
            return Err(CommandError::TooManyOptions(self.name.clone()));
        }

        let mut seen = HashSet::new();
        let mut optional_seen = false;
        for param in &self.params {
            if !seen.insert(param.name.as_str()) {
                return Err(CommandError::DuplicateOption {
                    command: self.name.clone(),
                    option: param.name.clone(),
                });
            }
            if param.required && optional_seen {
                return Err(CommandError::RequiredAfterOptional {
                    command: self.name.clone(),
                    option: param.name.clone(),
                });
            }
            optional_seen |= !param.required;
        }
        Ok(())
    }

    /// Body of the create request
    pub fn payload(&self) -> Value {
        json!({
            "name": self.name,
            "type": CHAT_INPUT,
            "description": self.description,
            "options": self.params.iter().map(CommandParam::payload).collect::<Vec<_>>(),
        })
    }
}

/// A command as the vendor reports it
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredCommand {
    #[serde(default)]
    id: Option<Snowflake>,
    name: String,
    #[serde(default)]
    guild_id: Option<Snowflake>,
}

impl RegisteredCommand {
    pub fn new(name: impl Into<String>, scope: CommandScope) -> Self {
        Self {
            id: None,
            name: name.into(),
            guild_id: match scope {
                CommandScope::Global => None,
                CommandScope::Guild(guild) => Some(guild),
            },
        }
    }

    pub fn id(&self) -> Option<Snowflake> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> CommandScope {
        self.guild_id.map_or(CommandScope::Global, CommandScope::Guild)
    }

    /// Pin the scope of a record fetched from a scoped collection
    pub(crate) fn in_scope(mut self, scope: CommandScope) -> Self {
        if let CommandScope::Guild(guild) = scope {
            self.guild_id = Some(guild);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rules() {
        assert!(validate_name("ping").is_ok());
        assert!(validate_name("roll-dice_2").is_ok());
        assert!(validate_name("café").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("has space").is_err());
        assert!(validate_name("bad!").is_err());
        assert!(validate_name(&"a".repeat(33)).is_err());
        assert!(validate_name(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_description_bounds() {
        assert!(PendingCommand::new("ping", "").is_err());
        assert!(PendingCommand::new("ping", "x".repeat(101)).is_err());
        assert!(PendingCommand::new("ping", "x".repeat(100)).is_ok());
    }

    #[test]
    fn test_param_types_from_rust_types() {
        let text = CommandParam::of::<String>("text", "What to say").unwrap();
        assert_eq!(text.kind(), ParamType::String);
        assert!(text.required());

        let count = CommandParam::of::<Option<i64>>("count", "How many").unwrap();
        assert_eq!(count.kind(), ParamType::Integer);
        assert!(!count.required());

        assert_eq!(<User as CommandParamType>::PARAM_TYPE.code(), 6);
        assert_eq!(<Option<Attachment> as CommandParamType>::PARAM_TYPE.code(), 11);
        assert_eq!(<f64 as CommandParamType>::PARAM_TYPE, ParamType::Number);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ParamType::from_name("Boolean").unwrap(), ParamType::Boolean);
        assert_eq!(ParamType::from_name("mentionable").unwrap().code(), 9);
        assert_eq!(
            ParamType::from_name("float"),
            Err(CommandError::UnknownType("float".to_string()))
        );
        assert_eq!(ParamType::from_code(10), Some(ParamType::Number));
        assert_eq!(ParamType::from_code(12), None);
    }

    #[test]
    fn test_payload_shape() {
        let command = PendingCommand::new("echo", "Repeat text")
            .unwrap()
            .param(CommandParam::of::<String>("text", "What to repeat").unwrap())
            .param(CommandParam::of::<Option<bool>>("loud", "Shout it").unwrap());
        command.validate().unwrap();

        assert_eq!(
            command.payload(),
            json!({
                "name": "echo",
                "type": 1,
                "description": "Repeat text",
                "options": [
                    { "name": "text", "description": "What to repeat", "type": 3, "required": true },
                    { "name": "loud", "description": "Shout it", "type": 5, "required": false }
                ]
            })
        );
    }

    #[test]
    fn test_option_list_rules() {
        let text = CommandParam::of::<String>("text", "Text").unwrap();
        let duplicate = PendingCommand::new("echo", "Repeat")
            .unwrap()
            .param(text.clone())
            .param(text.clone());
        assert!(matches!(
            duplicate.validate(),
            Err(CommandError::DuplicateOption { .. })
        ));

        let misordered = PendingCommand::new("echo", "Repeat")
            .unwrap()
            .param(CommandParam::of::<Option<String>>("extra", "Extra").unwrap())
            .param(text);
        assert!(matches!(
            misordered.validate(),
            Err(CommandError::RequiredAfterOptional { .. })
        ));
    }

    #[test]
    fn test_scope_routes() {
        let app = Snowflake::new(7);
        assert_eq!(CommandScope::Global.route(app), "applications/7/commands");
        assert_eq!(
            CommandScope::Guild(Snowflake::new(123)).route(app),
            "applications/7/guilds/123/commands"
        );
        let private = PendingCommand::new("ping", "Pong").unwrap().private(Snowflake::new(123));
        assert_eq!(private.scope(), CommandScope::Guild(Snowflake::new(123)));
    }
}
