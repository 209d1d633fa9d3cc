//! One-shot historical count
//!
//! Walks every configured channel's history into the sheet, then exits.
//! Same effect as pressing the start button, without a gateway connection.

use dotenv::dotenv;
use mention_tally::discord::DiscordGateway;
use mention_tally::pipeline::{ChannelWalk, LogProgress, MemberCache, TallyRuntime};
use mention_tally::{bootstrap, AppConfig};
use serenity::http::Http;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    bootstrap::init_logging(&config.runtime.rust_log);
    bootstrap::install_crypto_provider();

    log::info!("🚀 Starting historical count");
    config.log_summary();

    let store = bootstrap::build_store(&config)?;
    let http = Arc::new(Http::new(&config.runtime.discord_token));
    let directory = Arc::new(MemberCache::new(
        DiscordGateway::new(http.clone()),
        config.tally.member_cache_ttl,
    ));
    let runtime = TallyRuntime::assemble(
        &config.tally,
        store,
        Arc::new(DiscordGateway::new(http)),
        directory,
    );

    let summary = runtime.backfill(&LogProgress).await;

    log::info!("📊 Historical count summary");
    for walk in &summary.channels {
        match walk {
            ChannelWalk::Completed(report) => log::info!(
                "   ├─ #{}: {} pages, {} messages, {} mentions",
                report.channel_name,
                report.pages,
                report.messages,
                report.mentions
            ),
            ChannelWalk::Skipped { channel_id, reason } => {
                log::info!("   ├─ {}: skipped ({})", channel_id, reason)
            }
            ChannelWalk::Failed { channel_id, error } => {
                log::info!("   ├─ {}: failed ({})", channel_id, error)
            }
        }
    }
    log::info!("   └─ Total mentions: {}", summary.total_mentions());

    if summary.has_failures() {
        return Err(format!("{} channel(s) failed", summary.failed()).into());
    }
    Ok(())
}
