//! Client-side conversation model, storage and reply generation.

pub mod conversation_store;
pub mod core;
pub mod responder;
pub mod storage;

pub use conversation_store::{ConversationStore, Persistence};
