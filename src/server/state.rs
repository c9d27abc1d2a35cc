//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::core::config::ChatConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::responder::{KeywordResponder, Responder};

use super::service::ServerConversationService;

/// Shared application state.
pub struct AppState {
    /// Conversation persistence and reply generation.
    pub service: ServerConversationService,
}

impl AppState {
    /// Wrap an existing service.
    #[must_use]
    pub fn new(service: ServerConversationService) -> Arc<Self> {
        Arc::new(Self { service })
    }

    /// Open the server database named by `config` with the keyword responder.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn from_config(config: &ChatConfig) -> ChatResult<Arc<Self>> {
        let responder: Arc<dyn Responder> = Arc::new(KeywordResponder::new());
        let service =
            ServerConversationService::open(&config.storage.server_db_path, responder).await?;
        Ok(Self::new(service))
    }
}
