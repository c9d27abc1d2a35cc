//! Flat key-value fallback tier.
//!
//! The file holds one JSON object mapping string keys to string values,
//! the way browser local storage does. The conversation collection is a
//! single serialized blob under [`CHATS_KEY`]; the current pointer lives
//! under [`CURRENT_CHAT_KEY`]. Keys this tier does not own are preserved,
//! except when the file cannot be parsed: a snapshot write then replaces
//! the whole file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;

use super::{Snapshot, SnapshotTier, TierFuture};

/// Key holding the serialized conversation collection.
pub const CHATS_KEY: &str = "glossyChat_chats";

/// Key holding the current-conversation id.
pub const CURRENT_CHAT_KEY: &str = "glossyChat_currentChat";

type KeyValues = BTreeMap<String, String>;

/// File-backed implementation of the fallback tier.
#[derive(Clone, Debug)]
pub struct FileFallbackTier {
    path: PathBuf,
}

impl FileFallbackTier {
    /// Tier name used in logs.
    pub const NAME: &'static str = "fallback";

    /// Use the key-value file at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one raw value.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the file exists but cannot be parsed.
    pub fn get_item(&self, key: &str) -> ChatResult<Option<String>> {
        Ok(self.load_map()?.remove(key))
    }

    /// Write one raw value, keeping every other key.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the file cannot be read or written.
    pub fn set_item(&self, key: &str, value: &str) -> ChatResult<()> {
        let mut map = self.load_map()?;
        map.insert(key.to_string(), value.to_string());
        self.store_map(&map)
    }

    fn load_map(&self) -> ChatResult<KeyValues> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(KeyValues::new()),
            Err(err) => return Err(ChatError::unavailable(Self::NAME, err)),
        };
        if raw.trim().is_empty() {
            return Ok(KeyValues::new());
        }
        serde_json::from_str(&raw).map_err(|e| ChatError::unavailable(Self::NAME, e))
    }

    fn store_map(&self, map: &KeyValues) -> ChatResult<()> {
        let raw = serde_json::to_string(map).map_err(|e| ChatError::unavailable(Self::NAME, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ChatError::unavailable(Self::NAME, e))?;
        }

        // Write and fsync a sibling, then rename over the target.
        let tmp = self.path.with_extension("tmp");
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(raw.as_bytes())?;
            file.sync_all()
        });
        written.map_err(|e| ChatError::unavailable(Self::NAME, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| ChatError::unavailable(Self::NAME, e))
    }

    fn read_snapshot(&self) -> ChatResult<Snapshot> {
        let mut map = self.load_map()?;
        let conversations: Vec<Conversation> = match map.remove(CHATS_KEY) {
            Some(blob) => {
                serde_json::from_str(&blob).map_err(|e| ChatError::unavailable(Self::NAME, e))?
            }
            None => Vec::new(),
        };
        let current_id = map
            .remove(CURRENT_CHAT_KEY)
            .and_then(|id| ConversationId::parse(id).ok());

        Ok(Snapshot {
            conversations,
            current_id,
        })
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> ChatResult<()> {
        let blob = serde_json::to_string(&snapshot.conversations)
            .map_err(|e| ChatError::unavailable(Self::NAME, e))?;

        let mut map = self.load_map().unwrap_or_else(|err| {
            warn!(
                path = %self.path.display(),
                "Unreadable fallback file, replacing it and dropping its other keys: {err}"
            );
            KeyValues::new()
        });
        map.insert(CHATS_KEY.to_string(), blob);
        match &snapshot.current_id {
            Some(id) => {
                map.insert(CURRENT_CHAT_KEY.to_string(), id.to_string());
            }
            None => {
                map.remove(CURRENT_CHAT_KEY);
            }
        }
        self.store_map(&map)
    }
}

impl SnapshotTier for FileFallbackTier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read_all(&self) -> TierFuture<'_, ChatResult<Snapshot>> {
        Box::pin(async move {
            let snapshot = self.read_snapshot()?;
            debug!(
                count = snapshot.conversations.len(),
                path = %self.path.display(),
                "Read snapshot from fallback tier"
            );
            Ok(snapshot)
        })
    }

    fn write_all(&self, snapshot: &Snapshot) -> TierFuture<'_, ChatResult<()>> {
        let result = self.write_snapshot(snapshot);
        Box::pin(async move { result })
    }
}
