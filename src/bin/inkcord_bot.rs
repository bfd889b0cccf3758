use anyhow::Result;
use inkcord::bin_common::{
    config_type_from_args, load_config_from_env, parse_args, BinaryRunner, RunConfig,
};
use inkcord::bot::{init_tracing, Bot, BotConfig};
use inkcord::gateway::{EventDispatcher, Listener};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

struct DemoBot {
    run_config: RunConfig,
    bot: Option<Bot>,
}

impl DemoBot {
    fn new(config: BotConfig) -> Result<Self> {
        let builder = Bot::builder(config)?;

        builder.listener(Listener::on_event("MESSAGE_CREATE", |ctx| {
            let data = ctx.data();
            let author = data["author"]["username"].as_str().unwrap_or("unknown");
            let content = data["content"].as_str().unwrap_or_default();
            info!("[seq {:?}] {}: {}", ctx.seq(), author, content);
            None
        }));

        builder.handle("ping", |ctx| {
            ctx.reply("pong")?;
            Ok(())
        })?;

        builder.handle("roll", |ctx| {
            let sides = ctx.option("sides").and_then(Value::as_i64).unwrap_or(6).max(1);
            let rolled = rand::thread_rng().gen_range(1..=sides);
            ctx.reply(format!("You rolled {} (d{})", rolled, sides))?;
            Ok(())
        })?;

        Ok(Self {
            run_config: RunConfig::new("inkcord bot").with_status_interval(60),
            bot: Some(builder.build()),
        })
    }
}

impl BinaryRunner for DemoBot {
    async fn run(&mut self) -> Result<()> {
        let Some(bot) = self.bot.take() else {
            warn!("Bot already ran");
            return Ok(());
        };

        let status = tokio::spawn(report_status(
            Arc::clone(bot.dispatcher()),
            self.run_config.status_interval(),
        ));
        let result = bot.run().await;
        status.abort();
        Ok(result?)
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

async fn report_status(dispatcher: Arc<EventDispatcher>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        info!(
            "Status: {} listeners, {} jobs in flight, {} deferred",
            dispatcher.listener_count(),
            dispatcher.in_flight(),
            dispatcher.deferred()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    // Usage: inkcord-bot [config.yaml]
    let config_path = load_config_from_env(config_type_from_args(&parse_args()));
    let config = BotConfig::load(&config_path)?;

    init_tracing(&config.log_level);
    config.log();

    let mut app = DemoBot::new(config)?;
    app.execute().await
}
