//! Client-side storage tiers.
//!
//! Every tier stores the complete [`Snapshot`]: the conversation set plus
//! the current-conversation pointer. The store ranks tiers and treats
//! them uniformly through [`SnapshotTier`]:
//! - `durable_store`: `SQLite` tier, the preferred source on reads
//! - `fallback_store`: flat JSON key-value file mirrored on every write

pub mod durable_store;
pub mod fallback_store;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::chat::core::config::StorageConfig;
use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::ConversationId;

pub use durable_store::SqliteDurableTier;
pub use fallback_store::FileFallbackTier;

/// Boxed future type for tier operations.
pub type TierFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Full persisted state: all conversations plus the current pointer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Conversations in stored order.
    pub conversations: Vec<Conversation>,
    /// Current-conversation pointer as last written, possibly stale.
    pub current_id: Option<ConversationId>,
}

impl Snapshot {
    /// Whether the snapshot holds no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Uniform capability every storage tier exposes.
pub trait SnapshotTier: Send + Sync {
    /// Short tier name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Read the whole snapshot. An empty store yields an empty snapshot.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the tier cannot be read.
    fn read_all(&self) -> TierFuture<'_, ChatResult<Snapshot>>;

    /// Replace the stored snapshot with `snapshot`.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the tier cannot be written.
    fn write_all(&self, snapshot: &Snapshot) -> TierFuture<'_, ChatResult<()>>;
}

/// Open the standard tier chain: durable first, fallback second.
///
/// A tier that fails to open is logged and left out of the chain.
pub async fn open_default_tiers(config: &StorageConfig) -> Vec<Arc<dyn SnapshotTier>> {
    let mut tiers: Vec<Arc<dyn SnapshotTier>> = Vec::with_capacity(2);

    match SqliteDurableTier::open(&config.durable_path).await {
        Ok(tier) => tiers.push(Arc::new(tier)),
        Err(err) => warn!("Durable tier unavailable, continuing without it: {err}"),
    }

    tiers.push(Arc::new(FileFallbackTier::new(&config.fallback_path)));
    tiers
}
