//! Historical count control button
//!
//! One button is posted into the command channel the first time the bot
//! becomes ready. A click walks every configured channel in column order and
//! reports progress through an ephemeral reply:
//!
//! ```text
//! defer → "Starting…" → "Counting channel i/N…" (per channel) → "complete" → delete after 5s
//!                                                            └→ "failed" (kept)
//! ```

use crate::pipeline::walker::{BackfillSummary, ProgressSink};
use crate::pipeline::TallyRuntime;
use async_trait::async_trait;
use serenity::builder::{CreateActionRow, CreateButton, CreateMessage, EditInteractionResponse};
use serenity::http::Http;
use serenity::model::application::{ButtonStyle, ComponentInteraction};
use serenity::model::id::ChannelId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const START_BUTTON_ID: &str = "start_historical_count";
pub const START_BUTTON_LABEL: &str = "⭐ Start historical count";
pub const STARTING_TEXT: &str = "✅ Starting historical count… (this can take a while)";
pub const COMPLETE_TEXT: &str = "🎉 Historical count complete! This message will be deleted in 5 seconds.";
pub const FAILED_TEXT: &str = "❌ Historical count failed, check the bot logs.";
pub const REPLY_LIFETIME: Duration = Duration::from_secs(5);

pub fn progress_text(position: usize, total: usize) -> String {
    format!("⏳ Counting channel {}/{}…", position, total)
}

/// Final reply for a finished run
pub fn outcome_text(summary: &BackfillSummary) -> &'static str {
    if summary.has_failures() {
        FAILED_TEXT
    } else {
        COMPLETE_TEXT
    }
}

fn start_message() -> CreateMessage {
    let button = CreateButton::new(START_BUTTON_ID)
        .label(START_BUTTON_LABEL)
        .style(ButtonStyle::Primary);
    CreateMessage::new().components(vec![CreateActionRow::Buttons(vec![button])])
}

pub struct ControlPanel {
    runtime: Arc<TallyRuntime>,
    command_channel_id: Option<u64>,
    posted: AtomicBool,
}

impl ControlPanel {
    pub fn new(runtime: Arc<TallyRuntime>, command_channel_id: Option<u64>) -> Self {
        Self {
            runtime,
            command_channel_id,
            posted: AtomicBool::new(false),
        }
    }

    /// Post the start button, once per process. Reconnects fire `ready`
    /// again and must not post a second button.
    pub async fn post_button(&self, http: &Http) {
        let Some(channel_id) = self.command_channel_id else {
            return;
        };
        if self.posted.swap(true, Ordering::SeqCst) {
            return;
        }

        match ChannelId::new(channel_id).send_message(http, start_message()).await {
            Ok(_) => log::info!("🔘 Start button posted in channel {}", channel_id),
            Err(e) => log::error!("❌ Failed to post start button in channel {}: {}", channel_id, e),
        }
    }

    pub fn handles(&self, interaction: &ComponentInteraction) -> bool {
        interaction.data.custom_id == START_BUTTON_ID
    }

    /// Run the historical count for a button click.
    pub async fn run(&self, http: Arc<Http>, interaction: ComponentInteraction) {
        log::info!("⭐ Historical count requested by {}", interaction.user.name);

        if let Err(e) = interaction.defer_ephemeral(&*http).await {
            log::error!("❌ Could not acknowledge start button: {}", e);
            return;
        }

        let reply = InteractionReply {
            http: http.clone(),
            interaction,
        };
        reply.edit(STARTING_TEXT).await;

        let summary = self.runtime.backfill(&reply).await;
        log::info!("📊 Historical count finished");
        log::info!("   ├─ Completed: {}", summary.completed());
        log::info!("   ├─ Skipped: {}", summary.skipped());
        log::info!("   ├─ Failed: {}", summary.failed());
        log::info!("   └─ Mentions: {}", summary.total_mentions());

        reply.edit(outcome_text(&summary)).await;
        if summary.has_failures() {
            return;
        }

        tokio::time::sleep(REPLY_LIFETIME).await;
        if let Err(e) = reply.interaction.delete_response(&*http).await {
            log::warn!("⚠️  Could not delete historical count reply: {}", e);
        }
    }
}

/// The ephemeral reply to one click, doubling as the walk's progress sink
struct InteractionReply {
    http: Arc<Http>,
    interaction: ComponentInteraction,
}

impl InteractionReply {
    async fn edit(&self, content: &str) {
        let edit = EditInteractionResponse::new().content(content);
        if let Err(e) = self.interaction.edit_response(&*self.http, edit).await {
            log::warn!("⚠️  Could not update historical count reply: {}", e);
        }
    }
}

#[async_trait]
impl ProgressSink for InteractionReply {
    async fn channel_started(&self, position: usize, total: usize, channel_id: u64) {
        log::info!("⏳ Counting channel {}/{} ({})", position, total, channel_id);
        self.edit(&progress_text(position, total)).await;
    }
}
