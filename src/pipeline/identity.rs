//! Identity key resolution
//!
//! Turns a mentioned account into the (display label, handle) pair that
//! addresses its sheet row. Display labels are guild-scoped, so they come from
//! a [`MemberDirectory`]; [`MemberCache`] puts a time-bounded cache in front of
//! the remote lookup.
//!
//! Lookups fail soft: a member that cannot be resolved (left the guild,
//! lookup error) is skipped rather than failing the batch.

use super::gateway::GatewayError;
use super::types::{ChatMessage, ChatUser, IdentityKey};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Source of guild-scoped display names
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn display_name(&self, guild_id: u64, user_id: u64) -> Result<String, GatewayError>;
}

/// Cache-or-fetch wrapper around another directory.
///
/// Successful lookups are kept for `ttl`; failures are never cached so a
/// member who rejoins is picked up on the next mention.
pub struct MemberCache<D> {
    inner: D,
    ttl: Duration,
    entries: RwLock<HashMap<(u64, u64), (String, Instant)>>,
}

impl<D: MemberDirectory> MemberCache<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl<D: MemberDirectory> MemberDirectory for MemberCache<D> {
    async fn display_name(&self, guild_id: u64, user_id: u64) -> Result<String, GatewayError> {
        {
            let entries = self.entries.read().await;
            if let Some((name, fetched_at)) = entries.get(&(guild_id, user_id)) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(name.clone());
                }
            }
        }

        let name = self.inner.display_name(guild_id, user_id).await?;
        self.entries
            .write()
            .await
            .insert((guild_id, user_id), (name.clone(), Instant::now()));
        Ok(name)
    }
}

/// Maps a mentioned user to its row identity, or None to skip the mention.
///
/// Swapping this implementation is how the row identity scheme changes
/// (e.g. keying by handle only).
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, message: &ChatMessage, user: &ChatUser) -> Option<IdentityKey>;
}

/// Keys rows by the member's display name at mention time plus their handle.
pub struct DisplayNameResolver {
    directory: Arc<dyn MemberDirectory>,
    excluded_user_id: Option<u64>,
}

impl DisplayNameResolver {
    pub fn new(directory: Arc<dyn MemberDirectory>, excluded_user_id: Option<u64>) -> Self {
        Self {
            directory,
            excluded_user_id,
        }
    }
}

#[async_trait]
impl IdentityResolver for DisplayNameResolver {
    async fn resolve(&self, message: &ChatMessage, user: &ChatUser) -> Option<IdentityKey> {
        if self.excluded_user_id == Some(user.id) {
            return None;
        }

        let guild_id = message.guild_id?;
        let handle = user.handle.trim();
        if handle.is_empty() {
            log::debug!("Skipping mention of {}: account has no handle", user.id);
            return None;
        }

        let label = match self.directory.display_name(guild_id, user.id).await {
            Ok(label) => label,
            Err(e) => {
                log::debug!("Skipping mention of {} in message {}: {}", user.id, message.id, e);
                return None;
            }
        };

        let label = if label.trim().is_empty() {
            handle.to_string()
        } else {
            label
        };

        Some(IdentityKey::new(label, handle))
    }
}
