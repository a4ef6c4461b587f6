//! Session message log

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A single displayed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

/// Append-only, session-scoped message sequence
///
/// Insertion order is display order. Timestamps never decrease along the
/// sequence, even if the wall clock steps backwards between appends.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) -> &Message {
        self.push(text.into(), true)
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, text: impl Into<String>) -> &Message {
        self.push(text.into(), false)
    }

    fn push(&mut self, text: String, is_user: bool) -> &Message {
        let now = Utc::now();
        let timestamp = self
            .messages
            .last()
            .map_or(now, |last| last.timestamp.max(now));

        tracing::trace!(is_user, len = text.len(), "message appended");

        self.messages.push(Message {
            id: Uuid::new_v4(),
            text,
            is_user,
            timestamp,
        });
        // Just pushed, so last() is Some
        &self.messages[self.messages.len() - 1]
    }

    /// All messages in display order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message has been appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_order() {
        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        conversation.push_assistant("hi");

        let texts: Vec<_> = conversation
            .messages()
            .iter()
            .map(|m| (m.text.as_str(), m.is_user))
            .collect();
        assert_eq!(texts, vec![("hello", true), ("hi", false)]);
    }

    #[test]
    fn test_ids_unique_and_timestamps_monotonic() {
        let mut conversation = Conversation::new();
        for i in 0..20 {
            conversation.push_user(format!("q{i}"));
            conversation.push_assistant(format!("a{i}"));
        }

        let messages = conversation.messages();
        for pair in messages.windows(2) {
            assert_ne!(pair[0].id, pair[1].id);
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert_eq!(conversation.len(), 40);
    }
}
