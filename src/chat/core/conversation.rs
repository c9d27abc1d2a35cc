//! Conversation record and title derivation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::{Message, Sender};

/// Bot greeting that seeds every new conversation.
pub const WELCOME_MESSAGE: &str =
    "Hello there! I'm your glossy assistant. How can I help you today?";

/// Title used until the first user message names the conversation.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Number of characters kept when deriving a title.
pub const TITLE_MAX_CHARS: usize = 20;

/// Derive a sidebar title from the first user message.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters and appends `...` when the
/// text was longer.
#[must_use]
pub fn derive_title(text: &str) -> String {
    let mut chars = text.chars();
    let mut title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        title.push_str("...");
    }
    title
}

/// Current time truncated to millisecond precision, the resolution every
/// tier stores.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Next timestamp for a thread whose newest message is `last`.
///
/// Returns `now` unless that would not be strictly after `last`.
#[must_use]
pub fn next_timestamp(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match last {
        Some(last) if now <= last => last + Duration::milliseconds(1),
        _ => now,
    }
}

/// A named, ordered thread of messages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Messages in insertion order.
    pub messages: Vec<Message>,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
}

impl Conversation {
    /// Create a conversation seeded with the welcome message.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(ConversationId::new(), now_millis())
    }

    /// Create a conversation with a known id and creation time.
    #[must_use]
    pub fn with_id(id: ConversationId, created: DateTime<Utc>) -> Self {
        Self {
            id,
            title: DEFAULT_TITLE.to_string(),
            messages: vec![Message::new(WELCOME_MESSAGE, Sender::Bot, created)],
            created,
        }
    }

    /// Append a message, deriving the title on the first user message.
    pub fn push(&mut self, content: impl Into<String>, sender: Sender) -> &Message {
        let last = self.last_message().map(|m| m.timestamp);
        let timestamp = next_timestamp(last, now_millis());
        self.messages.push(Message::new(content, sender, timestamp));

        if sender == Sender::User && self.user_message_count() == 1 {
            self.title = derive_title(&self.messages[self.messages.len() - 1].content);
        }

        &self.messages[self.messages.len() - 1]
    }

    /// Seed the welcome message into a conversation that has none.
    ///
    /// Returns `true` if the message was added.
    pub fn ensure_welcome(&mut self) -> bool {
        if !self.messages.is_empty() {
            return false;
        }
        self.messages
            .push(Message::new(WELCOME_MESSAGE, Sender::Bot, self.created));
        true
    }

    /// Number of messages authored by the user.
    #[must_use]
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    /// Most recent message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_welcome_only_fills_empty() {
        let mut conversation = Conversation::new();
        assert!(!conversation.ensure_welcome());
        assert_eq!(conversation.messages.len(), 1);

        conversation.messages.clear();
        assert!(conversation.ensure_welcome());
        assert_eq!(conversation.last_message().map(|m| m.content.as_str()), Some(WELCOME_MESSAGE));
        assert_eq!(conversation.messages[0].timestamp, conversation.created);
    }

    #[test]
    fn test_new_conversation_has_welcome() {
        let conversation = Conversation::new();
        assert_eq!(conversation.title, DEFAULT_TITLE);
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].sender, Sender::Bot);
        assert_eq!(conversation.messages[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn test_derive_title_truncates() {
        assert_eq!(
            derive_title("Hello world, this is a long test message"),
            "Hello world, this is..."
        );
        assert_eq!(derive_title("short"), "short");
        assert_eq!(derive_title("exactly twenty chars"), "exactly twenty chars");
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "ééééééééééééééééééééé";
        assert_eq!(derive_title(text), format!("{}...", "é".repeat(20)));
    }

    #[test]
    fn test_title_derived_once() {
        let mut conversation = Conversation::new();
        conversation.push("first question", Sender::User);
        conversation.push("an answer", Sender::Bot);
        conversation.push("second question entirely different", Sender::User);
        assert_eq!(conversation.title, "first question");
    }

    #[test]
    fn test_bot_message_does_not_derive_title() {
        let mut conversation = Conversation::new();
        conversation.push("bot chatter", Sender::Bot);
        assert_eq!(conversation.title, DEFAULT_TITLE);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut conversation = Conversation::new();
        for i in 0..20 {
            conversation.push(format!("m{i}"), Sender::User);
        }
        for pair in conversation.messages.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn test_next_timestamp() {
        let now = now_millis();
        assert_eq!(next_timestamp(None, now), now);
        assert_eq!(
            next_timestamp(Some(now), now),
            now + Duration::milliseconds(1)
        );
        let earlier = now - Duration::seconds(5);
        assert_eq!(next_timestamp(Some(earlier), now), now);
    }
}
