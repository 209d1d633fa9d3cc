//! Core data structures for mention counting

use std::collections::HashMap;

/// Account as seen by the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: u64,
    /// Stable account handle (username), never the guild nickname
    pub handle: String,
    /// Automation (bot/webhook) account
    pub bot: bool,
}

impl ChatUser {
    pub fn new(id: u64, handle: impl Into<String>) -> Self {
        Self {
            id,
            handle: handle.into(),
            bot: false,
        }
    }

    pub fn bot(id: u64, handle: impl Into<String>) -> Self {
        Self {
            bot: true,
            ..Self::new(id, handle)
        }
    }
}

/// Chat message normalized away from the gateway's own model.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub channel_id: u64,
    /// None for direct messages
    pub guild_id: Option<u64>,
    pub author: ChatUser,
    pub content: String,
    /// Users the gateway reports as mentioned, in gateway order (may repeat)
    pub mentions: Vec<ChatUser>,
    /// Content not loaded yet; must be hydrated through the gateway before counting
    pub partial: bool,
}

impl ChatMessage {
    /// Mentioned users deduplicated by account id, first occurrence wins.
    pub fn distinct_mentions(&self) -> Vec<&ChatUser> {
        let mut seen = Vec::with_capacity(self.mentions.len());
        let mut users = Vec::with_capacity(self.mentions.len());
        for user in &self.mentions {
            if !seen.contains(&user.id) {
                seen.push(user.id);
                users.push(user);
            }
        }
        users
    }

    pub fn has_mentions(&self) -> bool {
        !self.mentions.is_empty()
    }
}

/// Row identity in the sheet: the (display label, handle) pair.
///
/// A member who changes their guild display name gets a new row; the old
/// row keeps the counts collected under the old name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub display_label: String,
    pub handle: String,
}

impl IdentityKey {
    pub fn new(display_label: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            display_label: display_label.into(),
            handle: handle.into(),
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.display_label, self.handle)
    }
}

/// One recipient's mention count within one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    pub recipient: IdentityKey,
    pub occurrences: u32,
}

/// Per-batch mention totals for a single count column.
///
/// Keys keep their first-insertion order so that reconciliation issues its
/// writes (and appends new rows) in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    column: usize,
    index: HashMap<IdentityKey, usize>,
    entries: Vec<(IdentityKey, i64)>,
}

impl Aggregate {
    pub fn new(column: usize) -> Self {
        Self {
            column,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Zero-based count column this aggregate targets
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn add(&mut self, key: IdentityKey, count: i64) {
        match self.index.get(&key) {
            Some(&position) => self.entries[position].1 += count,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, count));
            }
        }
    }

    pub fn record(&mut self, event: MentionEvent) {
        self.add(event.recipient, i64::from(event.occurrences));
    }

    pub fn get(&self, key: &IdentityKey) -> Option<i64> {
        self.index.get(key).map(|&position| self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, i64)> {
        self.entries.iter().map(|(key, count)| (key, *count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> i64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }
}

/// Ordered list of monitored channels; list position is the count column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelColumnMap {
    channels: Vec<u64>,
}

impl ChannelColumnMap {
    pub fn new(channels: Vec<u64>) -> Self {
        Self { channels }
    }

    /// Column index for a channel, None if the channel is not monitored
    pub fn column_of(&self, channel_id: u64) -> Option<usize> {
        self.channels.iter().position(|&id| id == channel_id)
    }

    pub fn channel_at(&self, column: usize) -> Option<u64> {
        self.channels.get(column).copied()
    }

    /// (column, channel id) pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.channels.iter().copied().enumerate()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
