//! Chat gateway boundary
//!
//! The pipeline only needs three things from the chat side: open a channel,
//! page through its history, and load messages that arrived without their
//! content. Member names go through [`super::identity::MemberDirectory`].

use super::types::ChatMessage;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("channel {0} not found or not accessible")]
    ChannelUnavailable(u64),
    #[error("user {user_id} is not a member of guild {guild_id}")]
    MemberUnavailable { guild_id: u64, user_id: u64 },
    #[error("gateway request failed: {0}")]
    Transport(String),
}

/// Channel metadata returned by [`ChatGateway::fetch_channel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub guild_id: Option<u64>,
    pub name: String,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Look a channel up by id.
    ///
    /// Returns `ChannelUnavailable` when the channel is missing or the bot
    /// cannot see it.
    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, GatewayError>;

    /// Fetch up to `limit` messages strictly older than `before`
    /// (the most recent messages when `before` is None), newest first.
    ///
    /// An empty page means the start of the channel was reached.
    async fn fetch_history(
        &self,
        channel_id: u64,
        before: Option<u64>,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, GatewayError>;

    /// Load the full message behind a partial one.
    async fn hydrate(&self, message: ChatMessage) -> Result<ChatMessage, GatewayError>;
}
