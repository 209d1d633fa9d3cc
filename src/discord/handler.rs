//! Gateway event handler

use super::adapter::to_chat_message;
use super::control::ControlPanel;
use crate::pipeline::dispatcher::{DispatchOutcome, SkipReason};
use crate::pipeline::TallyRuntime;
use async_trait::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::prelude::{Context, EventHandler};
use std::sync::Arc;

/// Guilds, guild messages, message content and guild members
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
}

pub struct Handler {
    runtime: Arc<TallyRuntime>,
    control: Arc<ControlPanel>,
}

impl Handler {
    pub fn new(runtime: Arc<TallyRuntime>, control: ControlPanel) -> Self {
        Self {
            runtime,
            control: Arc::new(control),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("🤖 Logged in as {}", ready.user.name);
        self.control.post_button(&ctx.http).await;
    }

    async fn message(&self, _ctx: Context, message: Message) {
        let chat_message = to_chat_message(&message);
        match self.runtime.dispatcher.dispatch(&chat_message).await {
            DispatchOutcome::Counted { column, outcome } if outcome.mentions > 0 => {
                log::info!(
                    "✅ Counted {} mentions from message {} (column {})",
                    outcome.mentions,
                    chat_message.id,
                    column
                );
            }
            DispatchOutcome::Skipped(SkipReason::UnmonitoredChannel) => {}
            DispatchOutcome::Skipped(reason) => {
                log::trace!("Message {} skipped: {:?}", chat_message.id, reason);
            }
            _ => {}
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        if !self.control.handles(&component) {
            return;
        }

        let control = self.control.clone();
        let http = ctx.http.clone();
        tokio::spawn(async move {
            control.run(http, component).await;
        });
    }
}
