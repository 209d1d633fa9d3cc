//! Historical walker
//!
//! ```text
//! FETCHING_PAGE ── page non-empty ──► PROCESSING_PAGE ──► FETCHING_PAGE (cursor = oldest id)
//!       │
//!       └── page empty ──► DONE
//! ```
//!
//! Each page goes through one aggregate-and-reconcile pass. Pages are spaced
//! by the page throttle; a failed page ends that channel's walk without retry.

use super::engine::MentionEngine;
use super::gateway::ChatGateway;
use super::types::{ChannelColumnMap, ChatMessage};
use crate::error::TallyError;
use crate::throttle::Throttle;
use async_trait::async_trait;
use std::sync::Arc;

/// Totals for one channel's walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub channel_id: u64,
    pub channel_name: String,
    pub pages: usize,
    pub messages: usize,
    pub mentions: i64,
    /// Pages that produced at least one write
    pub reconciliations: usize,
}

#[derive(Debug)]
pub enum ChannelWalk {
    Completed(WalkReport),
    /// Channel missing or not visible to the bot
    Skipped { channel_id: u64, reason: String },
    Failed { channel_id: u64, error: TallyError },
}

#[derive(Debug, Default)]
pub struct BackfillSummary {
    pub channels: Vec<ChannelWalk>,
}

impl BackfillSummary {
    pub fn completed(&self) -> usize {
        self.channels
            .iter()
            .filter(|walk| matches!(walk, ChannelWalk::Completed(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.channels
            .iter()
            .filter(|walk| matches!(walk, ChannelWalk::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.channels
            .iter()
            .filter(|walk| matches!(walk, ChannelWalk::Failed { .. }))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn total_mentions(&self) -> i64 {
        self.channels
            .iter()
            .map(|walk| match walk {
                ChannelWalk::Completed(report) => report.mentions,
                _ => 0,
            })
            .sum()
    }
}

/// Receives progress while [`HistoricalWalker::walk_all`] runs.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Called before channel `position` (1-based) of `total` is walked.
    async fn channel_started(&self, position: usize, total: usize, channel_id: u64);
}

/// Progress sink that only logs
pub struct LogProgress;

#[async_trait]
impl ProgressSink for LogProgress {
    async fn channel_started(&self, position: usize, total: usize, channel_id: u64) {
        log::info!("⏳ Counting channel {}/{} ({})", position, total, channel_id);
    }
}

pub struct HistoricalWalker {
    gateway: Arc<dyn ChatGateway>,
    engine: Arc<MentionEngine>,
    page_size: u8,
    page_throttle: Throttle,
}

impl HistoricalWalker {
    pub fn new(gateway: Arc<dyn ChatGateway>, engine: Arc<MentionEngine>, page_size: u8, page_throttle: Throttle) -> Self {
        Self {
            gateway,
            engine,
            page_size: page_size.max(1),
            page_throttle,
        }
    }

    /// Walk one channel's whole history into count column `column`.
    pub async fn walk(&self, channel_id: u64, column: usize) -> Result<WalkReport, TallyError> {
        let channel = self.gateway.fetch_channel(channel_id).await?;
        let guild_id = channel.guild_id;
        let mut report = WalkReport {
            channel_id,
            channel_name: channel.name,
            ..WalkReport::default()
        };
        let mut cursor: Option<u64> = None;

        loop {
            self.page_throttle.acquire().await;
            let page = self
                .gateway
                .fetch_history(channel_id, cursor, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            let oldest = page.iter().map(|message| message.id).min();
            let mut page = self.hydrate_page(page).await?;
            // History endpoints leave out the guild id
            for message in page.iter_mut() {
                message.guild_id = message.guild_id.or(guild_id);
            }
            let outcome = self.engine.process_batch(&page, column).await?;

            report.pages += 1;
            report.messages += page.len();
            report.mentions += outcome.mentions;
            if outcome.writes.writes() > 0 {
                report.reconciliations += 1;
            }
            log::debug!(
                "📄 #{} page {}: {} messages, {} mentions",
                report.channel_name,
                report.pages,
                page.len(),
                outcome.mentions
            );

            if oldest.is_none() || oldest == cursor {
                log::warn!("⚠️  #{}: history cursor stopped moving, ending walk", report.channel_name);
                break;
            }
            cursor = oldest;
        }

        Ok(report)
    }

    /// Walk every configured channel in column order.
    ///
    /// A channel that cannot be opened is skipped, a channel whose walk fails
    /// is recorded as failed; neither stops the remaining channels.
    pub async fn walk_all(&self, channels: &ChannelColumnMap, progress: &dyn ProgressSink) -> BackfillSummary {
        let mut summary = BackfillSummary::default();
        let total = channels.len();

        for (column, channel_id) in channels.iter() {
            progress.channel_started(column + 1, total, channel_id).await;

            let walk = match self.walk(channel_id, column).await {
                Ok(report) => {
                    log::info!("✅ Channel #{} counted", report.channel_name);
                    log::info!("   ├─ Pages: {}", report.pages);
                    log::info!("   ├─ Messages: {}", report.messages);
                    log::info!("   └─ Mentions: {}", report.mentions);
                    ChannelWalk::Completed(report)
                }
                Err(e) if e.is_channel_access() => {
                    log::warn!("⚠️  Skipping channel {}: {}", channel_id, e);
                    ChannelWalk::Skipped {
                        channel_id,
                        reason: e.to_string(),
                    }
                }
                Err(e) => {
                    log::error!("❌ Historical count of channel {} failed: {}", channel_id, e);
                    ChannelWalk::Failed { channel_id, error: e }
                }
            };
            summary.channels.push(walk);
        }

        summary
    }

    async fn hydrate_page(&self, page: Vec<ChatMessage>) -> Result<Vec<ChatMessage>, TallyError> {
        let mut hydrated = Vec::with_capacity(page.len());
        for message in page {
            if message.partial {
                hydrated.push(self.gateway.hydrate(message).await?);
            } else {
                hydrated.push(message);
            }
        }
        Ok(hydrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregator::BatchAggregator;
    use crate::pipeline::extractor::MentionExtractor;
    use crate::pipeline::gateway::{ChannelInfo, GatewayError};
    use crate::pipeline::identity::{DisplayNameResolver, MemberDirectory};
    use crate::pipeline::reconciler::{SheetLayout, SheetReconciler};
    use crate::pipeline::types::ChatUser;
    use crate::sheets::{Cell, InMemorySheet};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct EchoDirectory;

    #[async_trait]
    impl MemberDirectory for EchoDirectory {
        async fn display_name(&self, _guild_id: u64, user_id: u64) -> Result<String, GatewayError> {
            Ok(format!("Member {}", user_id))
        }
    }

    /// Channel histories kept oldest first; pages are served newest first.
    #[derive(Default)]
    struct ScriptedGateway {
        histories: HashMap<u64, Vec<ChatMessage>>,
        failing_channels: Vec<u64>,
        fetches: AtomicUsize,
        hydrated: AtomicUsize,
        cursors: Mutex<Vec<Option<u64>>>,
    }

    #[async_trait]
    impl ChatGateway for ScriptedGateway {
        async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, GatewayError> {
            if !self.histories.contains_key(&channel_id) {
                return Err(GatewayError::ChannelUnavailable(channel_id));
            }
            Ok(ChannelInfo {
                id: channel_id,
                guild_id: Some(5),
                name: format!("chan-{}", channel_id),
            })
        }

        async fn fetch_history(
            &self,
            channel_id: u64,
            before: Option<u64>,
            limit: u8,
        ) -> Result<Vec<ChatMessage>, GatewayError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.cursors.lock().unwrap().push(before);
            if self.failing_channels.contains(&channel_id) {
                return Err(GatewayError::Transport("connection reset".to_string()));
            }
            let history = self.histories.get(&channel_id).cloned().unwrap_or_default();
            Ok(history
                .into_iter()
                .rev()
                .filter(|message| before.map_or(true, |cursor| message.id < cursor))
                .take(limit as usize)
                .collect())
        }

        async fn hydrate(&self, mut message: ChatMessage) -> Result<ChatMessage, GatewayError> {
            self.hydrated.fetch_add(1, Ordering::SeqCst);
            message.content = message
                .mentions
                .iter()
                .map(|user| format!("<@{}>", user.id))
                .collect::<Vec<_>>()
                .join(" ");
            message.partial = false;
            Ok(message)
        }
    }

    fn message(id: u64, channel_id: u64, mentioned: u64) -> ChatMessage {
        ChatMessage {
            id,
            channel_id,
            guild_id: Some(5),
            author: ChatUser::new(9, "author"),
            content: format!("hi <@{}>", mentioned),
            mentions: vec![ChatUser::new(mentioned, format!("user{}", mentioned))],
            partial: false,
        }
    }

    fn walker(gateway: Arc<ScriptedGateway>, sheet: Arc<InMemorySheet>, channels: usize) -> HistoricalWalker {
        let resolver = Arc::new(DisplayNameResolver::new(Arc::new(EchoDirectory), None));
        let engine = MentionEngine::new(
            BatchAggregator::new(MentionExtractor::new(resolver)),
            SheetReconciler::new(sheet, SheetLayout::new("bot3", channels)),
        );
        HistoricalWalker::new(gateway, Arc::new(engine), 3, Throttle::unlimited())
    }

    #[tokio::test]
    async fn test_walk_fetches_every_page_plus_terminator() {
        let history: Vec<_> = (1..=7).map(|id| message(id, 10, 1)).collect();
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, history)]),
            ..Default::default()
        });
        let sheet = Arc::new(InMemorySheet::new("bot3"));

        let report = walker(gateway.clone(), sheet.clone(), 1).walk(10, 0).await.unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.messages, 7);
        assert_eq!(report.mentions, 7);
        assert_eq!(report.reconciliations, 3);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 4);
        assert_eq!(*gateway.cursors.lock().unwrap(), vec![None, Some(5), Some(2), Some(1)]);
        assert_eq!(
            sheet.rows(),
            vec![vec![Cell::text("Member 1"), Cell::text("user1"), Cell::Int(7)]]
        );
    }

    #[tokio::test]
    async fn test_walk_hydrates_partial_messages() {
        let mut partial = message(1, 10, 2);
        partial.content.clear();
        partial.partial = true;
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, vec![partial])]),
            ..Default::default()
        });

        let report = walker(gateway.clone(), Arc::new(InMemorySheet::new("bot3")), 1)
            .walk(10, 0)
            .await
            .unwrap();

        assert_eq!(gateway.hydrated.load(Ordering::SeqCst), 1);
        assert_eq!(report.mentions, 1);
    }

    #[tokio::test]
    async fn test_walk_fills_guild_from_channel() {
        let mut history_message = message(1, 10, 4);
        history_message.guild_id = None;
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, vec![history_message])]),
            ..Default::default()
        });

        let report = walker(gateway, Arc::new(InMemorySheet::new("bot3")), 1)
            .walk(10, 0)
            .await
            .unwrap();

        assert_eq!(report.mentions, 1);
        assert_eq!(report.channel_name, "chan-10");
    }

    #[tokio::test]
    async fn test_walk_all_skips_missing_channel_and_continues() {
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(20, vec![message(1, 20, 3)])]),
            ..Default::default()
        });
        let sheet = Arc::new(InMemorySheet::new("bot3"));
        let channels = ChannelColumnMap::new(vec![10, 20]);

        let summary = walker(gateway, sheet.clone(), 2).walk_all(&channels, &LogProgress).await;

        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.completed(), 1);
        assert!(!summary.has_failures());
        assert_eq!(
            sheet.rows(),
            vec![vec![Cell::text("Member 3"), Cell::text("user3"), Cell::Int(0), Cell::Int(1)]]
        );
    }

    #[tokio::test]
    async fn test_page_error_fails_only_that_channel() {
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, vec![message(1, 10, 1)]), (20, vec![message(2, 20, 1)])]),
            failing_channels: vec![10],
            ..Default::default()
        });
        let channels = ChannelColumnMap::new(vec![10, 20]);

        let summary = walker(gateway, Arc::new(InMemorySheet::new("bot3")), 2)
            .walk_all(&channels, &LogProgress)
            .await;

        assert!(matches!(
            summary.channels[0],
            ChannelWalk::Failed {
                channel_id: 10,
                error: TallyError::Gateway(GatewayError::Transport(_))
            }
        ));
        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.total_mentions(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_stops_walk_without_retry() {
        let history: Vec<_> = (1..=6).map(|id| message(id, 10, 1)).collect();
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, history)]),
            ..Default::default()
        });
        let sheet = Arc::new(InMemorySheet::new("bot3"));
        sheet.fail_writes_after(1);

        let result = walker(gateway.clone(), sheet, 1).walk(10, 0).await;

        assert!(matches!(result, Err(TallyError::Store(_))));
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_are_spaced_by_throttle() {
        let history: Vec<_> = (1..=6).map(|id| message(id, 10, 1)).collect();
        let gateway = Arc::new(ScriptedGateway {
            histories: HashMap::from([(10, history)]),
            ..Default::default()
        });
        let resolver = Arc::new(DisplayNameResolver::new(Arc::new(EchoDirectory), None));
        let engine = MentionEngine::new(
            BatchAggregator::new(MentionExtractor::new(resolver)),
            SheetReconciler::new(Arc::new(InMemorySheet::new("bot3")), SheetLayout::new("bot3", 1)),
        );
        let walker = HistoricalWalker::new(gateway, Arc::new(engine), 3, Throttle::new(Duration::from_millis(150)));

        let start = tokio::time::Instant::now();
        walker.walk(10, 0).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
