//! Real-time dispatch: each new message is a batch of one

use super::engine::{BatchOutcome, MentionEngine};
use super::types::{ChannelColumnMap, ChatMessage};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BotAuthor,
    NoMentions,
    DirectMessage,
    UnmonitoredChannel,
    ExcludedAuthor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Counted { column: usize, outcome: BatchOutcome },
    /// Counting failed; already logged
    Failed(String),
}

pub struct RealtimeDispatcher {
    engine: Arc<MentionEngine>,
    channels: ChannelColumnMap,
    excluded_user_id: Option<u64>,
}

impl RealtimeDispatcher {
    pub fn new(engine: Arc<MentionEngine>, channels: ChannelColumnMap, excluded_user_id: Option<u64>) -> Self {
        Self {
            engine,
            channels,
            excluded_user_id,
        }
    }

    fn filter(&self, message: &ChatMessage) -> Result<usize, SkipReason> {
        if message.author.bot {
            return Err(SkipReason::BotAuthor);
        }
        if !message.has_mentions() {
            return Err(SkipReason::NoMentions);
        }
        if message.guild_id.is_none() {
            return Err(SkipReason::DirectMessage);
        }
        let column = self
            .channels
            .column_of(message.channel_id)
            .ok_or(SkipReason::UnmonitoredChannel)?;
        if self.excluded_user_id == Some(message.author.id) {
            return Err(SkipReason::ExcludedAuthor);
        }
        Ok(column)
    }

    /// Count one newly arrived message. Never returns an error: failures are
    /// logged and reported in the outcome, and the next message is unaffected.
    pub async fn dispatch(&self, message: &ChatMessage) -> DispatchOutcome {
        let column = match self.filter(message) {
            Ok(column) => column,
            Err(reason) => return DispatchOutcome::Skipped(reason),
        };

        match self
            .engine
            .process_batch(std::slice::from_ref(message), column)
            .await
        {
            Ok(outcome) => {
                if outcome.mentions > 0 {
                    log::debug!(
                        "💬 Message {} in channel {}: {} mentions, {} identities",
                        message.id,
                        message.channel_id,
                        outcome.mentions,
                        outcome.identities
                    );
                }
                DispatchOutcome::Counted { column, outcome }
            }
            Err(e) => {
                log::error!("❌ Failed to count message {} in channel {}: {}", message.id, message.channel_id, e);
                DispatchOutcome::Failed(e.to_string())
            }
        }
    }
}
