//! serenity HTTP implementation of the chat gateway and member directory

use crate::pipeline::gateway::{ChannelInfo, ChatGateway, GatewayError};
use crate::pipeline::identity::MemberDirectory;
use crate::pipeline::types::{ChatMessage, ChatUser};
use async_trait::async_trait;
use serenity::builder::GetMessages;
use serenity::http::Http;
use serenity::model::channel::{Channel, Message};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::user::User;
use std::sync::Arc;

pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn to_chat_user(user: &User) -> ChatUser {
    ChatUser {
        id: user.id.get(),
        handle: user.name.clone(),
        bot: user.bot,
    }
}

/// A message that mentions someone but arrived without a body had its
/// content withheld and needs a refetch before counting.
pub fn is_partial(content: &str, mention_count: usize) -> bool {
    content.is_empty() && mention_count > 0
}

pub fn to_chat_message(message: &Message) -> ChatMessage {
    ChatMessage {
        id: message.id.get(),
        channel_id: message.channel_id.get(),
        guild_id: message.guild_id.map(|id| id.get()),
        author: to_chat_user(&message.author),
        content: message.content.clone(),
        mentions: message.mentions.iter().map(to_chat_user).collect(),
        partial: is_partial(&message.content, message.mentions.len()),
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, GatewayError> {
        let channel = ChannelId::new(channel_id)
            .to_channel(&*self.http)
            .await
            .map_err(|e| {
                log::debug!("Channel {} lookup failed: {}", channel_id, e);
                GatewayError::ChannelUnavailable(channel_id)
            })?;

        match channel {
            Channel::Guild(channel) => Ok(ChannelInfo {
                id: channel_id,
                guild_id: Some(channel.guild_id.get()),
                name: channel.name,
            }),
            Channel::Private(channel) => Ok(ChannelInfo {
                id: channel_id,
                guild_id: None,
                name: channel.recipient.name,
            }),
            _ => Err(GatewayError::ChannelUnavailable(channel_id)),
        }
    }

    async fn fetch_history(
        &self,
        channel_id: u64,
        before: Option<u64>,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let mut request = GetMessages::new().limit(limit);
        if let Some(before) = before {
            request = request.before(MessageId::new(before));
        }

        let messages = ChannelId::new(channel_id)
            .messages(&*self.http, request)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(messages.iter().map(to_chat_message).collect())
    }

    async fn hydrate(&self, message: ChatMessage) -> Result<ChatMessage, GatewayError> {
        let full = ChannelId::new(message.channel_id)
            .message(&*self.http, MessageId::new(message.id))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let mut hydrated = to_chat_message(&full);
        // Messages fetched by id carry no guild id
        hydrated.guild_id = hydrated.guild_id.or(message.guild_id);
        hydrated.partial = false;
        Ok(hydrated)
    }
}

#[async_trait]
impl MemberDirectory for DiscordGateway {
    async fn display_name(&self, guild_id: u64, user_id: u64) -> Result<String, GatewayError> {
        let member = GuildId::new(guild_id)
            .member(&*self.http, UserId::new(user_id))
            .await
            .map_err(|_| GatewayError::MemberUnavailable { guild_id, user_id })?;
        Ok(member.display_name().to_string())
    }
}
