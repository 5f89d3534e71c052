//! Ordered message log backing the visible conversation.

use chrono::{DateTime, Utc};

use aven_core::types::{Message, MessageId, Origin};

/// Append-only conversation log. Insertion order is display order.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    last_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message stamped with the current time.
    ///
    /// Returns `None` (and appends nothing) when `text` is blank.
    pub fn append(&mut self, origin: Origin, text: &str) -> Option<Message> {
        self.append_at(origin, text, Utc::now())
    }

    /// Append a message stamped with `created_at`.
    pub fn append_at(
        &mut self,
        origin: Origin,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let millis = u64::try_from(created_at.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last_id + 1);
        self.last_id = id;

        let message = Message {
            id: MessageId(id),
            text: text.to_string(),
            origin,
            created_at,
        };
        self.messages.push(message.clone());
        Some(message)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages from `origin`.
    pub fn count(&self, origin: Origin) -> usize {
        self.messages.iter().filter(|m| m.origin == origin).count()
    }

    /// Drop every message. Ids keep increasing after a clear.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
