//! Mention extraction
//!
//! Counts literal mention tokens per mentioned account. Both `<@ID>` and the
//! legacy nickname form `<@!ID>` count as the same token.

use super::identity::IdentityResolver;
use super::types::{ChatMessage, MentionEvent};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

static MENTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("mention token pattern is valid"));

/// Count every user mention token in `content`, keyed by account id.
pub fn count_mention_tokens(content: &str) -> HashMap<u64, u32> {
    let mut counts = HashMap::new();
    for captures in MENTION_TOKEN.captures_iter(content) {
        if let Some(id) = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    counts
}

/// True if the message is eligible for counting at all:
/// human author, at least one mention, posted in a guild.
pub fn is_countable(message: &ChatMessage) -> bool {
    !message.author.bot && message.has_mentions() && message.guild_id.is_some()
}

pub struct MentionExtractor {
    resolver: Arc<dyn IdentityResolver>,
}

impl MentionExtractor {
    pub fn new(resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { resolver }
    }

    /// One event per distinct mentioned account that resolves and whose
    /// token actually appears in the body.
    pub async fn extract(&self, message: &ChatMessage) -> Vec<MentionEvent> {
        if !is_countable(message) {
            return Vec::new();
        }

        let tokens = count_mention_tokens(&message.content);
        let mut events = Vec::new();

        for user in message.distinct_mentions() {
            let occurrences = tokens.get(&user.id).copied().unwrap_or(0);
            if occurrences == 0 {
                // Mentioned via reply/role expansion but no literal token
                continue;
            }

            if let Some(recipient) = self.resolver.resolve(message, user).await {
                events.push(MentionEvent {
                    recipient,
                    occurrences,
                });
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gateway::GatewayError;
    use crate::pipeline::identity::{DisplayNameResolver, MemberDirectory};
    use crate::pipeline::types::{ChatUser, IdentityKey};
    use async_trait::async_trait;

    struct FixedDirectory;

    #[async_trait]
    impl MemberDirectory for FixedDirectory {
        async fn display_name(&self, guild_id: u64, user_id: u64) -> Result<String, GatewayError> {
            match user_id {
                111 => Ok("Alice".to_string()),
                222 => Ok("Bob".to_string()),
                _ => Err(GatewayError::MemberUnavailable { guild_id, user_id }),
            }
        }
    }

    fn extractor(excluded: Option<u64>) -> MentionExtractor {
        MentionExtractor::new(Arc::new(DisplayNameResolver::new(
            Arc::new(FixedDirectory),
            excluded,
        )))
    }

    fn message(content: &str, mentions: Vec<ChatUser>) -> ChatMessage {
        ChatMessage {
            id: 1,
            channel_id: 10,
            guild_id: Some(5),
            author: ChatUser::new(9, "author"),
            content: content.to_string(),
            mentions,
            partial: false,
        }
    }

    #[test]
    fn test_count_tokens_both_forms() {
        let counts = count_mention_tokens("<@111> hi <@!111> and <@222>, not <@&333> or <#444>");
        assert_eq!(counts.get(&111), Some(&2));
        assert_eq!(counts.get(&222), Some(&1));
        assert_eq!(counts.get(&333), None);
        assert_eq!(counts.get(&444), None);
    }

    #[test]
    fn test_count_tokens_ignores_malformed() {
        let counts = count_mention_tokens("<@> <@abc> <@!> @111 <@ 111>");
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_extract_counts_repeated_tokens() {
        let msg = message(
            "<@111> hey <@111> <@222>",
            vec![ChatUser::new(111, "alice#0001"), ChatUser::new(222, "bob#0002")],
        );
        let events = extractor(None).extract(&msg).await;

        assert_eq!(
            events,
            vec![
                MentionEvent {
                    recipient: IdentityKey::new("Alice", "alice#0001"),
                    occurrences: 2
                },
                MentionEvent {
                    recipient: IdentityKey::new("Bob", "bob#0002"),
                    occurrences: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_dedupes_mention_list() {
        let msg = message(
            "<@111> <@!111> <@111>",
            vec![ChatUser::new(111, "alice#0001"), ChatUser::new(111, "alice#0001")],
        );
        let events = extractor(None).extract(&msg).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].occurrences, 3);
    }

    #[tokio::test]
    async fn test_extract_skips_excluded_user() {
        let msg = message(
            "<@111> <@111> <@111> <@222>",
            vec![ChatUser::new(111, "alice#0001"), ChatUser::new(222, "bob#0002")],
        );
        let events = extractor(Some(111)).extract(&msg).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipient.handle, "bob#0002");
    }

    #[tokio::test]
    async fn test_extract_skips_unresolvable_member() {
        let msg = message(
            "<@999> <@222>",
            vec![ChatUser::new(999, "gone"), ChatUser::new(222, "bob#0002")],
        );
        let events = extractor(None).extract(&msg).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].recipient.display_label, "Bob");
    }

    #[tokio::test]
    async fn test_extract_ignores_bot_authors() {
        let mut msg = message("<@111>", vec![ChatUser::new(111, "alice#0001")]);
        msg.author = ChatUser::bot(8, "helper");
        assert!(extractor(None).extract(&msg).await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_without_literal_token_emits_nothing() {
        let msg = message("replying without a ping", vec![ChatUser::new(111, "alice#0001")]);
        assert!(extractor(None).extract(&msg).await.is_empty());
    }

    #[tokio::test]
    async fn test_extract_ignores_direct_messages() {
        let mut msg = message("<@111>", vec![ChatUser::new(111, "alice#0001")]);
        msg.guild_id = None;
        assert!(extractor(None).extract(&msg).await.is_empty());
    }
}
