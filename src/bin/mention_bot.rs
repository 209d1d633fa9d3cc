//! Mention bot
//!
//! Long-running process that:
//!
//! - Counts mentions in monitored channels as messages arrive
//! - Posts the historical count button into the command channel
//! - Answers the keep-alive endpoint for uptime monitors

use dotenv::dotenv;
use mention_tally::discord::{gateway_intents, ControlPanel, DiscordGateway, Handler};
use mention_tally::pipeline::{MemberCache, TallyRuntime};
use mention_tally::{bootstrap, keepalive, AppConfig};
use serenity::http::Http;
use serenity::Client;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    bootstrap::init_logging(&config.runtime.rust_log);
    bootstrap::install_crypto_provider();

    log::info!("🚀 Starting mention bot");
    config.log_summary();

    let store = bootstrap::build_store(&config)?;
    let http = Arc::new(Http::new(&config.runtime.discord_token));
    let gateway = Arc::new(DiscordGateway::new(http.clone()));
    let directory = Arc::new(MemberCache::new(
        DiscordGateway::new(http),
        config.tally.member_cache_ttl,
    ));
    let runtime = Arc::new(TallyRuntime::assemble(&config.tally, store, gateway, directory));

    let port = config.runtime.keepalive_port;
    if port != 0 {
        tokio::spawn(async move {
            if let Err(e) = keepalive::serve(port).await {
                log::error!("❌ Keep-alive listener stopped: {}", e);
            }
        });
    }

    let control = ControlPanel::new(runtime.clone(), config.runtime.command_channel_id);
    let mut client = Client::builder(&config.runtime.discord_token, gateway_intents())
        .event_handler(Handler::new(runtime, control))
        .await?;

    log::info!("🔌 Connecting to Discord gateway");
    client.start().await?;
    Ok(())
}
