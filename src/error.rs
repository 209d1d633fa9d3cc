//! Pipeline-level error type

use crate::pipeline::gateway::GatewayError;
use crate::sheets::StoreError;

/// Failure of an aggregation or reconciliation pass.
///
/// Member lookup failures never show up here: they are absorbed by the
/// identity resolver and only cost the affected mention.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl TallyError {
    /// True when the walk could not even open its channel.
    pub fn is_channel_access(&self) -> bool {
        matches!(self, TallyError::Gateway(GatewayError::ChannelUnavailable(_)))
    }
}
