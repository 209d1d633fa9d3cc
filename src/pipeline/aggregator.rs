//! Batch aggregation: fold a batch of messages into one [`Aggregate`]

use super::extractor::MentionExtractor;
use super::types::{Aggregate, ChatMessage};

pub struct BatchAggregator {
    extractor: MentionExtractor,
}

impl BatchAggregator {
    pub fn new(extractor: MentionExtractor) -> Self {
        Self { extractor }
    }

    /// Sum mention occurrences per identity over `messages` for `column`.
    ///
    /// Never touches the store; an empty result is a normal outcome.
    pub async fn aggregate<'a, I>(&self, messages: I, column: usize) -> Aggregate
    where
        I: IntoIterator<Item = &'a ChatMessage>,
    {
        let mut aggregate = Aggregate::new(column);
        for message in messages {
            for event in self.extractor.extract(message).await {
                aggregate.record(event);
            }
        }
        aggregate
    }
}
