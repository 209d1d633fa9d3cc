//! Mention engine: aggregate a batch, then reconcile it
//!
//! The one path both the real-time dispatcher and the historical walker use,
//! so a message counts the same whichever way it arrives.

use super::aggregator::BatchAggregator;
use super::reconciler::{ReconcileOutcome, SheetReconciler};
use super::types::ChatMessage;
use crate::error::TallyError;

/// Result of one aggregate-and-reconcile pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Mention occurrences counted in the batch
    pub mentions: i64,
    /// Distinct identities touched
    pub identities: usize,
    pub writes: ReconcileOutcome,
}

pub struct MentionEngine {
    aggregator: BatchAggregator,
    reconciler: SheetReconciler,
}

impl MentionEngine {
    pub fn new(aggregator: BatchAggregator, reconciler: SheetReconciler) -> Self {
        Self {
            aggregator,
            reconciler,
        }
    }

    /// Count `messages` into count column `column`.
    pub async fn process_batch(&self, messages: &[ChatMessage], column: usize) -> Result<BatchOutcome, TallyError> {
        let aggregate = self.aggregator.aggregate(messages, column).await;
        if aggregate.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let writes = self.reconciler.reconcile(&aggregate).await?;
        Ok(BatchOutcome {
            mentions: aggregate.total(),
            identities: aggregate.len(),
            writes,
        })
    }
}
