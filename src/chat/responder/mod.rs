//! Reply generation for bot messages.

pub mod keyword;

pub use keyword::KeywordResponder;

/// Maps a user message to the bot's reply.
///
/// Implementations may be randomized but must not fail; the server calls
/// this inside an open transaction.
pub trait Responder: Send + Sync {
    /// Produce the reply text for `input`.
    fn generate(&self, input: &str) -> String;
}

/// Responder that always answers with the same text.
#[derive(Clone, Debug)]
pub struct FixedResponder {
    reply: String,
}

impl FixedResponder {
    /// Always reply with `reply`.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Responder for FixedResponder {
    fn generate(&self, _input: &str) -> String {
        self.reply.clone()
    }
}
