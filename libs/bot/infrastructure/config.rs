use crate::domain::{CommandError, CommandParam, Intents, PendingCommand, Snowflake};
use inkcord_gateway::{DispatcherConfig, ExponentialBackoff};
use inkcord_rest::{RestConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] CommandError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable holding the bot token
pub const TOKEN_ENV: &str = "BOT_TOKEN";
/// Environment variable holding the application id
pub const APPLICATION_ID_ENV: &str = "APPLICATION_ID";

/// Bot configuration
///
/// Loaded from YAML; the token and application id come from the
/// environment (or `.env`), never from the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub gateway: GatewaySettings,
    pub dispatch: DispatchSettings,
    pub rest: RestSettings,
    pub commands: CommandSettings,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Bot token from .env (not in YAML)
    #[serde(skip)]
    pub token: String,

    /// Application id from .env (not in YAML)
    #[serde(skip)]
    pub application_id: Option<Snowflake>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            dispatch: DispatchSettings::default(),
            rest: RestSettings::default(),
            commands: CommandSettings::default(),
            log_level: default_log_level(),
            token: String::new(),
            application_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Fixed gateway URL; fetched over REST when unset
    pub url: Option<String>,
    pub api_version: u8,
    /// Intent names, e.g. `GUILDS`, `GUILD_MESSAGES`
    pub intents: Vec<String>,
    pub hello_timeout_secs: u64,
    pub reconnect: ReconnectSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: None,
            api_version: 10,
            intents: vec!["GUILDS".to_string(), "GUILD_MESSAGES".to_string()],
            hello_timeout_secs: 20,
            reconnect: ReconnectSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failed connection attempts before the session is fatal
    pub max_failed_attempts: usize,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_failed_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub worker_count: usize,
    pub max_in_flight: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            worker_count: defaults.worker_count,
            max_in_flight: defaults.max_in_flight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Create missing commands once READY supplies the application id
    pub sync_on_ready: bool,
    /// Commands declared in config; handlers are attached in code
    pub declared: Vec<DeclaredCommand>,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            sync_on_ready: true,
            declared: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredCommand {
    pub name: String,
    pub description: String,
    /// Guild id for a guild-only command
    #[serde(default)]
    pub guild: Option<u64>,
    #[serde(default)]
    pub options: Vec<DeclaredOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredOption {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

impl DeclaredCommand {
    pub fn to_pending(&self) -> std::result::Result<PendingCommand, CommandError> {
        let mut command = PendingCommand::new(&self.name, &self.description)?;
        if let Some(guild) = self.guild {
            command = command.private(Snowflake::new(guild));
        }
        for option in &self.options {
            command = command.param(CommandParam::from_type_name(
                &option.name,
                &option.description,
                &option.kind,
                option.required,
            )?);
        }
        command.validate()?;
        Ok(command)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_required() -> bool {
    true
}

impl BotConfig {
    /// Load configuration from a YAML file and the environment
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: BotConfig = serde_yaml::from_str(&yaml_content)?;

        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;

        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without touching the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Fill the secrets from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.token = lookup(TOKEN_ENV)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::EnvVarMissing(TOKEN_ENV.to_string()))?;

        if let Some(raw) = lookup(APPLICATION_ID_ENV).filter(|raw| !raw.trim().is_empty()) {
            let id = raw.parse::<Snowflake>().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{} must be a numeric id, got '{}'",
                    APPLICATION_ID_ENV, raw
                ))
            })?;
            self.application_id = Some(id);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::EnvVarMissing(TOKEN_ENV.to_string()));
        }

        if self.dispatch.worker_count == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.worker_count must be greater than 0".to_string(),
            ));
        }
        if self.dispatch.max_in_flight == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_in_flight must be greater than 0".to_string(),
            ));
        }

        let reconnect = &self.gateway.reconnect;
        if reconnect.max_failed_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.reconnect.max_failed_attempts must be greater than 0".to_string(),
            ));
        }
        if reconnect.initial_delay_ms > reconnect.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "gateway.reconnect.initial_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        if self.gateway.hello_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.hello_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.rest.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "rest.timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.intents()?;
        self.declared_commands()?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn intents(&self) -> Result<Intents> {
        Intents::from_names(&self.gateway.intents)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn declared_commands(&self) -> Result<Vec<PendingCommand>> {
        self.commands
            .declared
            .iter()
            .map(|declared| declared.to_pending().map_err(ConfigError::from))
            .collect()
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            worker_count: self.dispatch.worker_count,
            max_in_flight: self.dispatch.max_in_flight,
        }
    }

    pub fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.rest.base_url.clone(),
            timeout: Duration::from_secs(self.rest.timeout_secs),
            ..RestConfig::default()
        }
    }

    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        let reconnect = &self.gateway.reconnect;
        ExponentialBackoff::new(
            Duration::from_millis(reconnect.initial_delay_ms),
            Duration::from_millis(reconnect.max_delay_ms),
            Some(reconnect.max_failed_attempts),
        )
    }

    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.hello_timeout_secs)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!(
            "  Gateway: {} (v{})",
            self.gateway.url.as_deref().unwrap_or("<fetched over REST>"),
            self.gateway.api_version
        );
        info!("  Intents: {}", self.gateway.intents.join(", "));
        info!(
            "  Reconnect: {}ms..{}ms, {} attempts",
            self.gateway.reconnect.initial_delay_ms,
            self.gateway.reconnect.max_delay_ms,
            self.gateway.reconnect.max_failed_attempts
        );
        info!(
            "  Dispatch: {} workers, {} in flight",
            self.dispatch.worker_count, self.dispatch.max_in_flight
        );
        info!("  REST: {}", self.rest.base_url);
        info!(
            "  Commands: {} declared, sync on ready: {}",
            self.commands.declared.len(),
            self.commands.sync_on_ready
        );
        info!("  Log level: {}", self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = BotConfig::from_yaml("{}").unwrap();
        assert_eq!(config.gateway.api_version, 10);
        assert_eq!(config.dispatch.worker_count, 4);
        assert_eq!(config.dispatch.max_in_flight, 64);
        assert_eq!(config.gateway.reconnect.max_failed_attempts, 3);
        assert_eq!(config.rest.base_url, DEFAULT_BASE_URL);
        assert!(config.commands.sync_on_ready);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.intents().unwrap().bits(), 513);
    }

    #[test]
    fn test_token_required_from_env() {
        let mut config = BotConfig::from_yaml("{}").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::EnvVarMissing(_))));
        assert!(matches!(
            config.apply_env(env(&[("BOT_TOKEN", "  ")])),
            Err(ConfigError::EnvVarMissing(_))
        ));

        config
            .apply_env(env(&[("BOT_TOKEN", "abc"), ("APPLICATION_ID", "4242")]))
            .unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.application_id, Some(Snowflake::new(4242)));
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_application_id_rejected() {
        let mut config = BotConfig::default();
        let result = config.apply_env(env(&[("BOT_TOKEN", "abc"), ("APPLICATION_ID", "app")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = BotConfig::from_yaml("dispatch:\n  worker_count: 0\n").unwrap();
        config.token = "abc".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config =
            BotConfig::from_yaml("gateway:\n  reconnect:\n    max_failed_attempts: 0\n").unwrap();
        config.token = "abc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_intent_rejected() {
        let mut config = BotConfig::from_yaml("gateway:\n  intents: [GUILDS, VOICE]\n").unwrap();
        config.token = "abc".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_declared_commands_parsed() {
        let yaml = r#"
commands:
  declared:
    - name: roll
      description: Roll a die
      guild: 123
      options:
        - name: sides
          description: Number of sides
          type: integer
          required: false
"#;
        let config = BotConfig::from_yaml(yaml).unwrap();
        let commands = config.declared_commands().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].guild(), Some(Snowflake::new(123)));
        assert_eq!(commands[0].params()[0].kind().code(), 4);
        assert!(!commands[0].params()[0].required());
    }

    #[test]
    fn test_declared_command_with_bad_type_rejected() {
        let yaml = r#"
commands:
  declared:
    - name: roll
      description: Roll a die
      options:
        - name: sides
          description: Number of sides
          type: dice
"#;
        let mut config = BotConfig::from_yaml(yaml).unwrap();
        config.token = "abc".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCommand(CommandError::UnknownType(_)))
        ));
    }
}
