//! SQLite-backed durable tier.

use std::path::Path;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;

use super::{Snapshot, SnapshotTier, TierFuture};

/// Key of the current-conversation pointer in the state table.
const CURRENT_CHAT_KEY: &str = "current_chat";

/// `SQLite` implementation of the durable tier.
///
/// Each conversation is stored whole, messages included, as one JSON
/// record keyed by id.
pub struct SqliteDurableTier {
    conn: Connection,
    table: String,
}

impl SqliteDurableTier {
    /// Tier name used in logs.
    pub const NAME: &'static str = "durable";

    /// Table name for conversation records.
    pub const DEFAULT_TABLE: &'static str = "chats";

    /// Open (or create) the tier database at `path`.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> ChatResult<Self> {
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|e| ChatError::unavailable(Self::NAME, e))?;
        Self::with_connection(conn).await
    }

    /// Build the tier on an already opened connection.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the schema cannot be created.
    pub async fn with_connection(conn: Connection) -> ChatResult<Self> {
        let table = Self::DEFAULT_TABLE.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    id TEXT PRIMARY KEY,
                    created INTEGER NOT NULL,
                    record TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_created
                    ON {table_name} (created);
                CREATE TABLE IF NOT EXISTS chat_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );"
            ))?;
            Ok(())
        })
        .await
        .map_err(|e| ChatError::unavailable(Self::NAME, e))?;

        Ok(Self { conn, table })
    }
}

impl SnapshotTier for SqliteDurableTier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read_all(&self) -> TierFuture<'_, ChatResult<Snapshot>> {
        Box::pin(async move {
            let table = self.table.clone();
            let (records, pointer) = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT record FROM {table} ORDER BY created ASC, rowid ASC"
                    ))?;
                    let records = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    let pointer: Option<String> = conn
                        .query_row(
                            "SELECT value FROM chat_state WHERE key = ?1",
                            [CURRENT_CHAT_KEY],
                            |row| row.get(0),
                        )
                        .optional()?;
                    Ok((records, pointer))
                })
                .await
                .map_err(|e| ChatError::unavailable(Self::NAME, e))?;

            let mut conversations = Vec::with_capacity(records.len());
            for record in records {
                let conversation: Conversation = serde_json::from_str(&record)
                    .map_err(|e| ChatError::unavailable(Self::NAME, e))?;
                conversations.push(conversation);
            }
            let current_id = pointer.and_then(|p| ConversationId::parse(p).ok());

            debug!(
                count = conversations.len(),
                "Read snapshot from durable tier"
            );
            Ok(Snapshot {
                conversations,
                current_id,
            })
        })
    }

    fn write_all(&self, snapshot: &Snapshot) -> TierFuture<'_, ChatResult<()>> {
        let snapshot = snapshot.clone();
        Box::pin(async move {
            let mut rows = Vec::with_capacity(snapshot.conversations.len());
            for conversation in &snapshot.conversations {
                let record = serde_json::to_string(conversation)
                    .map_err(|e| ChatError::unavailable(Self::NAME, e))?;
                rows.push((
                    conversation.id.to_string(),
                    conversation.created.timestamp_millis(),
                    record,
                ));
            }
            let pointer = snapshot.current_id.map(String::from);

            let table = self.table.clone();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(&format!("DELETE FROM {table}"), [])?;
                    {
                        let mut stmt = tx.prepare(&format!(
                            "INSERT INTO {table} (id, created, record) VALUES (?1, ?2, ?3)"
                        ))?;
                        for (id, created, record) in rows {
                            stmt.execute(rusqlite::params![id, created, record])?;
                        }
                    }
                    match pointer {
                        Some(id) => {
                            tx.execute(
                                "INSERT OR REPLACE INTO chat_state (key, value) VALUES (?1, ?2)",
                                rusqlite::params![CURRENT_CHAT_KEY, id],
                            )?;
                        }
                        None => {
                            tx.execute(
                                "DELETE FROM chat_state WHERE key = ?1",
                                [CURRENT_CHAT_KEY],
                            )?;
                        }
                    }
                    tx.commit()?;
                    Ok(())
                })
                .await
                .map_err(|e| ChatError::unavailable(Self::NAME, e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::message::Sender;

    async fn memory_tier() -> SqliteDurableTier {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteDurableTier::with_connection(conn).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_tier_reads_empty_snapshot() {
        let tier = memory_tier().await;
        let snapshot = tier.read_all().await.unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.current_id.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_preserves_snapshot() {
        let tier = memory_tier().await;
        let mut first = Conversation::new();
        first.push("hello there", Sender::User);
        let second = Conversation::new();
        let snapshot = Snapshot {
            current_id: Some(second.id.clone()),
            conversations: vec![first, second],
        };

        tier.write_all(&snapshot).await.unwrap();
        let read = tier.read_all().await.unwrap();
        assert_eq!(read, snapshot);
    }

    #[tokio::test]
    async fn test_write_replaces_previous_records() {
        let tier = memory_tier().await;
        let old = Conversation::new();
        tier.write_all(&Snapshot {
            current_id: Some(old.id.clone()),
            conversations: vec![old],
        })
        .await
        .unwrap();

        let replacement = Conversation::new();
        let snapshot = Snapshot {
            current_id: None,
            conversations: vec![replacement],
        };
        tier.write_all(&snapshot).await.unwrap();

        assert_eq!(tier.read_all().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.sqlite");
        let conversation = Conversation::new();
        let snapshot = Snapshot {
            current_id: Some(conversation.id.clone()),
            conversations: vec![conversation],
        };

        {
            let tier = SqliteDurableTier::open(&path).await.unwrap();
            tier.write_all(&snapshot).await.unwrap();
        }

        let reopened = SqliteDurableTier::open(&path).await.unwrap();
        assert_eq!(reopened.read_all().await.unwrap(), snapshot);
    }
}
