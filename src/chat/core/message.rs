//! Message model for conversation threads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Message typed by the user.
    User,
    /// Reply produced by the assistant.
    #[serde(alias = "assistant")]
    Bot,
}

impl Sender {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "bot" | "assistant" => Ok(Self::Bot),
            _ => Err(value.to_string()),
        }
    }
}

/// A single message inside a conversation.
///
/// Messages are immutable once appended; only the owning conversation
/// creates them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message text. Older snapshots stored this under `text`.
    #[serde(alias = "text")]
    pub content: String,
    /// Author.
    pub sender: Sender,
    /// Creation time, strictly increasing within a conversation.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped at `timestamp`.
    #[must_use]
    pub fn new(content: impl Into<String>, sender: Sender, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            sender,
            timestamp,
        }
    }

    /// Whether the user authored this message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

mod rusqlite_impl {
    use super::Sender;

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

    impl ToSql for Sender {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(ToSqlOutput::from(self.as_str()))
        }
    }

    impl FromSql for Sender {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            let raw = value.as_str()?;
            raw.parse()
                .map_err(|raw: String| FromSqlError::Other(format!("unknown sender: {raw}").into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_round_trips_through_str() {
        assert_eq!("user".parse::<Sender>(), Ok(Sender::User));
        assert_eq!("assistant".parse::<Sender>(), Ok(Sender::Bot));
        assert_eq!(Sender::Bot.to_string(), "bot");
        assert!("tool".parse::<Sender>().is_err());
    }

    #[test]
    fn test_reads_legacy_text_field() {
        let json = r#"{"text":"hey","sender":"user","timestamp":1700000000000}"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.content, "hey");
        assert_eq!(message.timestamp.timestamp_millis(), 1_700_000_000_000);
    }
}
