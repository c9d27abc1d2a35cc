//! Identifier types for conversations.
//!
//! Conversation ids are opaque strings. Freshly allocated ids are
//! `UUIDv7` values: a millisecond timestamp followed by random bits, so
//! collisions are negligible and ids sort roughly by creation time.
//! Any non-empty string is accepted when parsing, which keeps ids written
//! by older clients readable.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors returned when parsing a [`ConversationId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
}

impl fmt::Display for ConversationIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "conversation id must not be empty"),
            Self::TooLong { max, got } => {
                write!(f, "conversation id too long: got {got}, max {max}")
            }
        }
    }
}

impl std::error::Error for ConversationIdError {}

/// Identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 128;

    /// Allocate a new time-ordered identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Build a validated identifier from an existing string.
    ///
    /// # Errors
    /// Returns `ConversationIdError` if the input is empty or too long.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ConversationIdError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(ConversationIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ConversationIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::ConversationId;

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

    impl ToSql for ConversationId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(ToSqlOutput::from(self.as_str()))
        }
    }

    impl FromSql for ConversationId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(t) => {
                    let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                    Self::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = ConversationId::new();
        let b = ConversationId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_accepts_legacy_ids() {
        let id: ConversationId = "chat_1700000000000_k3j9x0abc".parse().unwrap();
        assert_eq!(id.as_str(), "chat_1700000000000_k3j9x0abc");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert_eq!(ConversationId::parse("   "), Err(ConversationIdError::Empty));
        let long = "x".repeat(ConversationId::MAX_LEN + 1);
        assert!(matches!(
            ConversationId::parse(long),
            Err(ConversationIdError::TooLong { .. })
        ));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = ConversationId::parse("abc").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
