//! Core chat types and identifiers.

pub mod config;
pub mod conversation;
pub mod errors;
pub mod ids;
pub mod message;

pub use config::{ChatConfig, ClientConfig, ServerConfig, StorageConfig};
pub use conversation::{
    Conversation, DEFAULT_TITLE, TITLE_MAX_CHARS, WELCOME_MESSAGE, derive_title, next_timestamp,
    now_millis,
};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationId, ConversationIdError};
pub use message::{Message, Sender};
