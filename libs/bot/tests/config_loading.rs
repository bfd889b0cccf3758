//! Integration test for loading `BotConfig` from a file and the environment

mod common;

use inkcord_bot::{BotBuilder, BotConfig, ConfigError, Snowflake};
use inkcord_gateway::Listener;
use std::io::Write;

const YAML: &str = r#"
gateway:
  intents: [GUILDS, GUILD_MESSAGES, MESSAGE_CONTENT]
  reconnect:
    max_failed_attempts: 5
dispatch:
  worker_count: 2
commands:
  sync_on_ready: false
  declared:
    - name: ping
      description: Check that the bot is alive
log_level: debug
"#;

// One test touches the process environment, so everything runs in sequence here
#[test]
fn test_load_from_file_and_environment() {
    verbose_println!("Testing config loading...");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();

    std::env::remove_var("BOT_TOKEN");
    std::env::remove_var("APPLICATION_ID");
    assert!(matches!(
        BotConfig::load(file.path()),
        Err(ConfigError::EnvVarMissing(_))
    ));

    std::env::set_var("BOT_TOKEN", "file-test-token");
    std::env::set_var("APPLICATION_ID", "4242");
    let config = BotConfig::load(file.path()).unwrap();
    config.log();

    assert_eq!(config.token, "file-test-token");
    assert_eq!(config.application_id, Some(Snowflake::new(4242)));
    assert_eq!(config.gateway.reconnect.max_failed_attempts, 5);
    assert_eq!(config.dispatch.worker_count, 2);
    assert_eq!(config.dispatch.max_in_flight, 64);
    assert_eq!(config.intents().unwrap().bits(), 1 | (1 << 9) | (1 << 15));
    assert!(!config.commands.sync_on_ready);

    // Declared commands land in the builder's registry without handlers
    let builder = BotBuilder::new(config).unwrap();
    builder.listener(Listener::on_event("MESSAGE_CREATE", |_| None));
    let attached = builder.handle("ping", |ctx| {
        ctx.reply("pong")?;
        Ok(())
    });
    assert_eq!(attached.unwrap().len(), 1);

    let bot = builder.build();
    assert_eq!(bot.commands().len(), 1);
    assert_eq!(bot.application_id(), Some(Snowflake::new(4242)));
    bot.dispatcher().shutdown();

    std::env::remove_var("BOT_TOKEN");
    std::env::remove_var("APPLICATION_ID");
}

#[test]
fn test_missing_file_is_an_io_error() {
    let result = BotConfig::load("/definitely/not/here/bot.yaml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}
