//! Client-side conversation store.
//!
//! Holds the session snapshot in memory and writes it through to a ranked
//! chain of [`SnapshotTier`]s after every mutation. Reads prefer the
//! highest-ranked tier that answers with data. Tier failures are logged
//! and absorbed; when every tier fails the session keeps working in
//! memory only.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chat::core::conversation::Conversation;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::chat::core::message::{Message, Sender};
use crate::chat::storage::{Snapshot, SnapshotTier};

/// Outcome of the most recent write-through.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Persistence {
    /// Nothing written yet in this session.
    Pending,
    /// Every tier accepted the snapshot.
    Complete,
    /// Some tiers failed but at least one accepted the snapshot.
    Partial,
    /// No tier accepted the snapshot; the session lives in memory only.
    MemoryOnly,
}

/// In-memory session: the conversation set and a pointer that always
/// names one of its members.
#[derive(Clone, Debug)]
struct Session {
    conversations: Vec<Conversation>,
    current_id: ConversationId,
}

impl Session {
    fn fresh() -> Self {
        let conversation = Conversation::new();
        Self {
            current_id: conversation.id.clone(),
            conversations: vec![conversation],
        }
    }

    /// Adopt a stored snapshot, repairing a stale or missing pointer with
    /// the earliest-created conversation. Records stored without messages
    /// get the welcome message back.
    fn from_snapshot(snapshot: Snapshot) -> Option<Self> {
        let Snapshot {
            mut conversations,
            current_id,
        } = snapshot;

        for conversation in &mut conversations {
            if conversation.ensure_welcome() {
                debug!(conversation_id = %conversation.id, "Restored welcome message");
            }
        }

        let current_id = match current_id {
            Some(id) if conversations.iter().any(|c| c.id == id) => id,
            _ => {
                let earliest = conversations
                    .iter()
                    .enumerate()
                    .min_by_key(|(index, c)| (c.created, *index))
                    .map(|(_, c)| c.id.clone())?;
                debug!(
                    current_id = %earliest,
                    "Stored pointer missing or stale, using earliest conversation"
                );
                earliest
            }
        };

        Some(Self {
            conversations,
            current_id,
        })
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            conversations: self.conversations.clone(),
            current_id: Some(self.current_id.clone()),
        }
    }

    fn position(&self, id: &ConversationId) -> ChatResult<usize> {
        self.conversations
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| ChatError::conversation_not_found(id))
    }

    fn find(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    fn current(&self) -> &Conversation {
        // Pointer names a member and the set is never empty.
        self.find(&self.current_id)
            .unwrap_or(&self.conversations[0])
    }
}

struct StoreState {
    session: Session,
    persistence: Persistence,
}

/// Orchestrates the in-memory session and its storage tiers.
pub struct ConversationStore {
    tiers: Vec<Arc<dyn SnapshotTier>>,
    state: Mutex<StoreState>,
}

impl ConversationStore {
    /// Build a store over `tiers` (highest rank first) and load it.
    pub async fn open(tiers: Vec<Arc<dyn SnapshotTier>>) -> Self {
        let read = Self::read_tiers(&tiers).await;
        let store = Self {
            tiers,
            state: Mutex::new(StoreState {
                session: Session::fresh(),
                persistence: Persistence::Pending,
            }),
        };

        let mut state = store.state.lock().await;
        store.finish_load(&mut state, read).await;
        drop(state);
        store
    }

    /// Reload the session from the tiers.
    ///
    /// Prefers the durable tier, then the fallback tier. When the readable
    /// tiers are all empty a default conversation is synthesized and
    /// persisted; when no tier can be read the in-memory session is kept
    /// and nothing is written.
    pub async fn load(&self) -> Snapshot {
        let read = Self::read_tiers(&self.tiers).await;
        let mut state = self.state.lock().await;
        self.finish_load(&mut state, read).await;
        state.session.to_snapshot()
    }

    /// Create a new conversation and make it current.
    pub async fn create(&self) -> Conversation {
        let conversation = Conversation::new();
        let created = conversation.clone();

        let outcome = self
            .mutate(|session| {
                session.current_id = conversation.id.clone();
                session.conversations.push(conversation);
                Ok(())
            })
            .await;
        if let Err(err) = outcome {
            warn!("Create failed: {err}");
        }

        info!(conversation_id = %created.id, "Created conversation");
        created
    }

    /// Delete a conversation and its messages.
    ///
    /// If it was current, the most recently created remaining conversation
    /// becomes current; if none remain, a default conversation replaces it.
    ///
    /// # Errors
    /// Returns `NotFound` if `id` is unknown.
    pub async fn delete(&self, id: &ConversationId) -> ChatResult<()> {
        self.mutate(|session| {
            let index = session.position(id)?;
            session.conversations.remove(index);

            if &session.current_id == id {
                let next = session
                    .conversations
                    .iter()
                    .enumerate()
                    .max_by_key(|(index, c)| (c.created, *index))
                    .map(|(_, c)| c.id.clone());
                session.current_id = match next {
                    Some(next) => next,
                    None => {
                        let replacement = Conversation::new();
                        let replacement_id = replacement.id.clone();
                        session.conversations.push(replacement);
                        replacement_id
                    }
                };
            }
            Ok(())
        })
        .await?;

        info!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    /// Append a message to a conversation.
    ///
    /// The first user message names the conversation.
    ///
    /// # Errors
    /// Returns `Validation` for blank text and `NotFound` for an unknown id.
    pub async fn append_message(
        &self,
        id: &ConversationId,
        text: &str,
        sender: Sender,
    ) -> ChatResult<Message> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("message text is required".to_string()));
        }

        let mut appended = None;
        self.mutate(|session| {
            let index = session.position(id)?;
            appended = Some(session.conversations[index].push(text, sender).clone());
            Ok(())
        })
        .await?;

        debug!(conversation_id = %id, sender = %sender, "Appended message");
        appended.ok_or_else(|| ChatError::conversation_not_found(id))
    }

    /// Append a message to the current conversation.
    ///
    /// # Errors
    /// Returns `Validation` for blank text.
    pub async fn append_to_current(&self, text: &str, sender: Sender) -> ChatResult<Message> {
        let id = self.current_id().await;
        self.append_message(&id, text, sender).await
    }

    /// Point the session at another conversation.
    ///
    /// # Errors
    /// Returns `NotFound` if `id` is unknown.
    pub async fn set_current(&self, id: &ConversationId) -> ChatResult<Conversation> {
        let mut selected = None;
        self.mutate(|session| {
            let index = session.position(id)?;
            session.current_id = id.clone();
            selected = Some(session.conversations[index].clone());
            Ok(())
        })
        .await?;

        debug!(conversation_id = %id, "Switched conversation");
        selected.ok_or_else(|| ChatError::conversation_not_found(id))
    }

    /// Give a conversation an explicit title.
    ///
    /// # Errors
    /// Returns `Validation` for a blank title and `NotFound` for an unknown id.
    pub async fn rename(&self, id: &ConversationId, title: &str) -> ChatResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::Validation("title is required".to_string()));
        }

        self.mutate(|session| {
            let index = session.position(id)?;
            session.conversations[index].title = title.to_string();
            Ok(())
        })
        .await?;

        debug!(conversation_id = %id, title, "Renamed conversation");
        Ok(())
    }

    /// The current conversation.
    pub async fn current(&self) -> Conversation {
        self.state.lock().await.session.current().clone()
    }

    /// Id of the current conversation.
    pub async fn current_id(&self) -> ConversationId {
        self.state.lock().await.session.current_id.clone()
    }

    /// Look up a conversation by id.
    pub async fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.state.lock().await.session.find(id).cloned()
    }

    /// All conversations, newest first.
    pub async fn list(&self) -> Vec<Conversation> {
        let mut conversations = self.state.lock().await.session.conversations.clone();
        conversations.sort_by(|a, b| b.created.cmp(&a.created));
        conversations
    }

    /// Copy of the full session state.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.session.to_snapshot()
    }

    /// Outcome of the most recent write-through.
    pub async fn persistence(&self) -> Persistence {
        self.state.lock().await.persistence
    }

    /// Apply `change` to a copy of the session, install the copy, then
    /// write it through to every tier.
    async fn mutate<F>(&self, change: F) -> ChatResult<()>
    where
        F: FnOnce(&mut Session) -> ChatResult<()>,
    {
        let mut state = self.state.lock().await;
        let mut draft = state.session.clone();
        change(&mut draft)?;
        state.session = draft;
        state.persistence = self.persist(&state.session.to_snapshot()).await;
        Ok(())
    }

    async fn finish_load(
        &self,
        state: &mut StoreState,
        read: ChatResult<Option<(Session, &'static str)>>,
    ) {
        match read {
            Ok(Some((session, tier))) => {
                info!(
                    tier,
                    count = session.conversations.len(),
                    "Loaded conversations"
                );
                state.session = session;
            }
            Ok(None) => {
                state.session = Session::fresh();
                info!(
                    conversation_id = %state.session.current_id,
                    "No stored conversations, created default conversation"
                );
                state.persistence = self.persist(&state.session.to_snapshot()).await;
            }
            Err(err) => error!("{err}; keeping in-memory session"),
        }
    }

    /// First non-empty snapshot in rank order.
    ///
    /// `Ok(None)` means some tier answered but all were empty; `Exhausted`
    /// means no tier could be read at all.
    async fn read_tiers(
        tiers: &[Arc<dyn SnapshotTier>],
    ) -> ChatResult<Option<(Session, &'static str)>> {
        let mut answered = false;
        for tier in tiers {
            match tier.read_all().await {
                Ok(snapshot) => {
                    answered = true;
                    if let Some(session) = Session::from_snapshot(snapshot) {
                        return Ok(Some((session, tier.name())));
                    }
                    debug!(tier = tier.name(), "Tier is empty");
                }
                Err(err) => warn!(tier = tier.name(), "Tier read failed, trying next: {err}"),
            }
        }

        if answered {
            Ok(None)
        } else {
            Err(ChatError::Exhausted)
        }
    }

    async fn persist(&self, snapshot: &Snapshot) -> Persistence {
        if self.tiers.is_empty() {
            error!("{}", ChatError::Exhausted);
            return Persistence::MemoryOnly;
        }

        let results = join_all(self.tiers.iter().map(|tier| tier.write_all(snapshot))).await;

        let mut written = 0;
        for (tier, result) in self.tiers.iter().zip(results) {
            match result {
                Ok(()) => written += 1,
                Err(err) => warn!(tier = tier.name(), "Tier write failed: {err}"),
            }
        }

        if written == self.tiers.len() {
            Persistence::Complete
        } else if written > 0 {
            Persistence::Partial
        } else {
            error!("{}", ChatError::Exhausted);
            Persistence::MemoryOnly
        }
    }
}
