//! Remote access to the conversation API.

pub mod client;

pub use client::HttpConversationClient;
