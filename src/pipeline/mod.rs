//! Mention counting pipeline
//!
//! ```text
//! ChatMessage
//!     ↓
//! MentionExtractor::extract()      (identity via IdentityResolver)
//!     ↓
//! BatchAggregator::aggregate()     → Aggregate (one count column)
//!     ↓
//! SheetReconciler::reconcile()     → TabularStore reads/writes
//! ```
//!
//! `RealtimeDispatcher` feeds single messages through [`MentionEngine`],
//! `HistoricalWalker` feeds whole history pages. Both share one engine, so
//! one reconciler (and, when enabled, one write lock) serves the process.

pub mod aggregator;
pub mod dispatcher;
pub mod engine;
pub mod extractor;
pub mod gateway;
pub mod identity;
pub mod reconciler;
pub mod types;
pub mod walker;

pub use aggregator::BatchAggregator;
pub use dispatcher::{DispatchOutcome, RealtimeDispatcher, SkipReason};
pub use engine::{BatchOutcome, MentionEngine};
pub use extractor::MentionExtractor;
pub use gateway::{ChannelInfo, ChatGateway, GatewayError};
pub use identity::{DisplayNameResolver, IdentityResolver, MemberCache, MemberDirectory};
pub use reconciler::{ReconcileOutcome, SheetLayout, SheetReconciler};
pub use types::{Aggregate, ChannelColumnMap, ChatMessage, ChatUser, IdentityKey, MentionEvent};
pub use walker::{BackfillSummary, ChannelWalk, HistoricalWalker, LogProgress, ProgressSink, WalkReport};

use crate::config::TallyConfig;
use crate::sheets::TabularStore;
use crate::throttle::Throttle;
use std::sync::Arc;

/// The wired-up pipeline: one engine shared by the dispatcher and the walker.
pub struct TallyRuntime {
    pub engine: Arc<MentionEngine>,
    pub dispatcher: Arc<RealtimeDispatcher>,
    pub walker: Arc<HistoricalWalker>,
    pub channels: ChannelColumnMap,
}

impl TallyRuntime {
    /// Wire the pipeline. `store` should already carry the write throttle;
    /// `directory` should already carry any member cache.
    pub fn assemble(
        config: &TallyConfig,
        store: Arc<dyn TabularStore>,
        gateway: Arc<dyn ChatGateway>,
        directory: Arc<dyn MemberDirectory>,
    ) -> Self {
        let resolver = Arc::new(DisplayNameResolver::new(directory, config.excluded_user_id));
        let layout = SheetLayout::new(config.sheet_name.clone(), config.channels.len());
        let reconciler = if config.serialize_reconciliation {
            SheetReconciler::serialized(store, layout)
        } else {
            SheetReconciler::new(store, layout)
        };

        let engine = Arc::new(MentionEngine::new(
            BatchAggregator::new(MentionExtractor::new(resolver)),
            reconciler,
        ));
        let dispatcher = Arc::new(RealtimeDispatcher::new(
            engine.clone(),
            config.channels.clone(),
            config.excluded_user_id,
        ));
        let walker = Arc::new(HistoricalWalker::new(
            gateway,
            engine.clone(),
            config.page_size,
            Throttle::new(config.batch_delay),
        ));

        Self {
            engine,
            dispatcher,
            walker,
            channels: config.channels.clone(),
        }
    }

    /// Historical count over every configured channel, in column order.
    pub async fn backfill(&self, progress: &dyn ProgressSink) -> BackfillSummary {
        self.walker.walk_all(&self.channels, progress).await
    }
}
