//! Relational conversation service behind the HTTP API.
//!
//! Conversations and messages live in two `SQLite` tables linked by a
//! foreign key. Every multi-statement operation runs in one transaction.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, Transaction, params};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::chat::core::conversation::{DEFAULT_TITLE, WELCOME_MESSAGE, derive_title};
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::Sender;
use crate::chat::responder::Responder;

/// Conversation row without its messages.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Conversation row together with its messages in chronological order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    /// Conversation fields.
    #[serde(flatten)]
    pub conversation: ConversationRecord,
    /// Messages ascending by timestamp.
    pub messages: Vec<MessageRecord>,
}

/// Message row with its server-assigned id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Row id.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Message text.
    pub content: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// The user message and the reply stored for it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageExchange {
    /// Stored user message.
    pub user_message: MessageRecord,
    /// Stored bot reply.
    pub bot_message: MessageRecord,
}

/// Steps of a conversation delete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeletePhase {
    /// Nothing started.
    Idle,
    /// Removing the conversation's messages.
    MessagesDeleting,
    /// Removing the conversation row.
    ConversationDeleting,
    /// Both deletes committed.
    Committed,
    /// Transaction rolled back; nothing changed.
    RolledBack,
}

fn advance(id: &str, from: DeletePhase, to: DeletePhase) -> DeletePhase {
    debug!(conversation_id = id, ?from, ?to, "Delete transition");
    to
}

/// Conversation service over a single `SQLite` connection.
#[derive(Clone)]
pub struct ServerConversationService {
    conn: Arc<Connection>,
    responder: Arc<dyn Responder>,
}

impl ServerConversationService {
    /// Open (or create) the database at `path`, creating missing parent
    /// directories.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(
        path: impl AsRef<Path>,
        responder: Arc<dyn Responder>,
    ) -> ChatResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::with_connection(Arc::new(conn), responder).await
    }

    /// Build the service on an already opened connection.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn with_connection(
        conn: Arc<Connection>,
        responder: Arc<dyn Responder>,
    ) -> ChatResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_conversations_created
                    ON conversations (created_at DESC);
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id TEXT NOT NULL REFERENCES conversations (id),
                    content TEXT NOT NULL,
                    sender TEXT NOT NULL CHECK (sender IN ('user', 'bot')),
                    timestamp INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages (conversation_id, timestamp);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, responder })
    }

    /// Create a conversation seeded with the welcome message.
    ///
    /// A missing or blank title becomes the default title.
    ///
    /// # Errors
    /// Returns `TransactionFailure` if either insert fails; nothing is kept.
    pub async fn create_conversation(
        &self,
        title: Option<String>,
    ) -> ChatResult<ConversationDetail> {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let id = ConversationId::new();
        let row_id = id.clone();

        let detail = self
            .conn
            .call(move |conn| {
                let now = Utc::now().timestamp_millis();
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO conversations (id, title, created_at) VALUES (?1, ?2, ?3)",
                    params![row_id, title, now],
                )?;
                let welcome = insert_message(&tx, &row_id, WELCOME_MESSAGE, Sender::Bot)?;
                tx.commit()?;

                Ok(ConversationDetail {
                    conversation: ConversationRecord {
                        id: row_id,
                        title,
                        created_at: millis_to_datetime(now),
                    },
                    messages: vec![welcome],
                })
            })
            .await
            .map_err(ChatError::transaction)?;

        info!(conversation_id = %id, "Created conversation");
        Ok(detail)
    }

    /// All conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_conversations(&self) -> ChatResult<Vec<ConversationRecord>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, created_at FROM conversations
                     ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map([], conversation_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// One conversation with its messages.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist.
    pub async fn get_conversation(&self, id: &ConversationId) -> ChatResult<ConversationDetail> {
        let key = id.clone();
        let detail = self
            .conn
            .call(move |conn| {
                let conversation = conn
                    .query_row(
                        "SELECT id, title, created_at FROM conversations WHERE id = ?1",
                        [&key],
                        conversation_from_row,
                    )
                    .optional()?;
                let Some(conversation) = conversation else {
                    return Ok(None);
                };
                let messages = select_messages(conn, &key)?;
                Ok(Some(ConversationDetail {
                    conversation,
                    messages,
                }))
            })
            .await?;

        detail.ok_or_else(|| ChatError::conversation_not_found(id))
    }

    /// Replace a conversation's title.
    ///
    /// # Errors
    /// Returns `Validation` for a blank title and `NotFound` if no row matched.
    pub async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> ChatResult<ConversationRecord> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(ChatError::Validation("title is required".to_string()));
        }

        let key = id.clone();
        let updated = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE conversations SET title = ?1 WHERE id = ?2",
                    params![title, key],
                )?;
                if changed == 0 {
                    return Ok(None);
                }
                let record = conn.query_row(
                    "SELECT id, title, created_at FROM conversations WHERE id = ?1",
                    [&key],
                    conversation_from_row,
                )?;
                Ok(Some(record))
            })
            .await?;

        let record = updated.ok_or_else(|| ChatError::conversation_not_found(id))?;
        debug!(conversation_id = %id, title = %record.title, "Updated title");
        Ok(record)
    }

    /// Delete a conversation and all of its messages atomically.
    ///
    /// # Errors
    /// Returns `NotFound` if the conversation does not exist (nothing is
    /// deleted) and `TransactionFailure` if a delete fails.
    pub async fn delete_conversation(&self, id: &ConversationId) -> ChatResult<()> {
        let key = id.clone();
        let removed = self
            .conn
            .call(move |conn| {
                let key = key.as_str();
                let mut phase = DeletePhase::Idle;
                let tx = conn.transaction()?;

                phase = advance(key, phase, DeletePhase::MessagesDeleting);
                let deleted = tx.execute("DELETE FROM messages WHERE conversation_id = ?1", [key]);
                let messages = match deleted {
                    Ok(n) => n,
                    Err(err) => {
                        advance(key, phase, DeletePhase::RolledBack);
                        return Err(err.into());
                    }
                };

                phase = advance(key, phase, DeletePhase::ConversationDeleting);
                let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", [key]);
                let conversations = match deleted {
                    Ok(n) => n,
                    Err(err) => {
                        advance(key, phase, DeletePhase::RolledBack);
                        return Err(err.into());
                    }
                };
                if conversations == 0 {
                    tx.rollback()?;
                    advance(key, phase, DeletePhase::RolledBack);
                    return Ok(None);
                }

                tx.commit()?;
                advance(key, phase, DeletePhase::Committed);
                Ok(Some(messages))
            })
            .await
            .map_err(ChatError::transaction)?;

        let messages = removed.ok_or_else(|| ChatError::conversation_not_found(id))?;
        info!(conversation_id = %id, messages, "Deleted conversation");
        Ok(())
    }

    /// Store a user message and the responder's reply.
    ///
    /// The first user message of a conversation that still has the default
    /// title names it.
    ///
    /// # Errors
    /// Returns `Validation` for blank content, `NotFound` for an unknown
    /// conversation and `TransactionFailure` if either insert fails.
    pub async fn post_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> ChatResult<MessageExchange> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation("message content is required".to_string()));
        }

        let key = id.clone();
        let content = content.to_string();
        let responder = Arc::clone(&self.responder);
        let exchange = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let title: Option<String> = tx
                    .query_row(
                        "SELECT title FROM conversations WHERE id = ?1",
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(title) = title else {
                    return Ok(None);
                };

                let earlier_user_messages: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND sender = 'user'",
                    [&key],
                    |row| row.get(0),
                )?;

                let user_message = insert_message(&tx, &key, &content, Sender::User)?;
                if earlier_user_messages == 0 && title == DEFAULT_TITLE {
                    tx.execute(
                        "UPDATE conversations SET title = ?1 WHERE id = ?2",
                        params![derive_title(&content), key],
                    )?;
                }

                let reply = responder.generate(&content);
                let bot_message = insert_message(&tx, &key, &reply, Sender::Bot)?;
                tx.commit()?;

                Ok(Some(MessageExchange {
                    user_message,
                    bot_message,
                }))
            })
            .await
            .map_err(ChatError::transaction)?;

        let exchange = exchange.ok_or_else(|| ChatError::conversation_not_found(id))?;
        debug!(conversation_id = %id, "Stored message exchange");
        Ok(exchange)
    }

    /// Messages of a conversation ascending by timestamp.
    ///
    /// An unknown id yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_messages(&self, id: &ConversationId) -> ChatResult<Vec<MessageRecord>> {
        let key = id.clone();
        let messages = self
            .conn
            .call(move |conn| Ok(select_messages(conn, &key)?))
            .await?;
        Ok(messages)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: millis_to_datetime(row.get(2)?),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        sender: row.get(3)?,
        timestamp: millis_to_datetime(row.get(4)?),
    })
}

fn select_messages(
    conn: &rusqlite::Connection,
    id: &ConversationId,
) -> rusqlite::Result<Vec<MessageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, content, sender, timestamp FROM messages
         WHERE conversation_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([id], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert one message with a timestamp strictly after the conversation's
/// latest message.
fn insert_message(
    tx: &Transaction<'_>,
    id: &ConversationId,
    content: &str,
    sender: Sender,
) -> rusqlite::Result<MessageRecord> {
    let last: Option<i64> = tx.query_row(
        "SELECT MAX(timestamp) FROM messages WHERE conversation_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    let now = Utc::now().timestamp_millis();
    let timestamp = last.map_or(now, |last| now.max(last + 1));

    tx.execute(
        "INSERT INTO messages (conversation_id, content, sender, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, content, sender, timestamp],
    )?;

    Ok(MessageRecord {
        id: tx.last_insert_rowid(),
        conversation_id: id.clone(),
        content: content.to_string(),
        sender,
        timestamp: millis_to_datetime(timestamp),
    })
}
