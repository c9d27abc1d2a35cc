//! HTTP client for the conversation API.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::chat::core::config::ClientConfig;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::ids::ConversationId;
use crate::server::routes::{
    ConversationList, CreateConversationRequest, DeleteResponse, ErrorBody, HealthResponse,
    MessageList, PostMessageRequest, UpdateTitleRequest, UpdateTitleResponse,
};
use crate::server::service::{
    ConversationDetail, ConversationRecord, MessageExchange, MessageRecord,
};

/// Request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a running conversation server.
#[derive(Clone, Debug)]
pub struct HttpConversationClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpConversationClient {
    /// Create a client for the API rooted at `api_url`
    /// (for example `http://localhost:3000/api`).
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(api_url: &str) -> ChatResult<Self> {
        let base = Url::parse(api_url)?;
        if base.cannot_be_a_base() {
            return Err(ChatError::InvalidConfig(format!(
                "api url cannot be a base: {api_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self { client, base })
    }

    /// Create a client from the client section of the configuration.
    ///
    /// # Errors
    /// Returns an error if the configured URL is invalid.
    pub fn from_config(config: &ClientConfig) -> ChatResult<Self> {
        Self::new(&config.api_url)
    }

    /// Server health.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn health(&self) -> ChatResult<HealthResponse> {
        let response = self.request(Method::GET, &["health"])?.send().await?;
        decode(response, "health").await
    }

    /// Create a conversation, optionally titled.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn create_conversation(&self, title: Option<&str>) -> ChatResult<ConversationDetail> {
        let body = CreateConversationRequest {
            title: title.map(str::to_string),
        };
        self.send_json(Method::POST, &["conversations"], &body, "conversations")
            .await
    }

    /// All conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn list_conversations(&self) -> ChatResult<Vec<ConversationRecord>> {
        let response = self
            .request(Method::GET, &["conversations"])?
            .send()
            .await?;
        let list: ConversationList = decode(response, "conversations").await?;
        Ok(list.conversations)
    }

    /// One conversation with its messages.
    ///
    /// # Errors
    /// Returns `NotFound` if the server has no such conversation.
    pub async fn get_conversation(&self, id: &ConversationId) -> ChatResult<ConversationDetail> {
        let response = self
            .request(Method::GET, &["conversations", id.as_str()])?
            .send()
            .await?;
        decode(response, id.as_str()).await
    }

    /// Rename a conversation.
    ///
    /// # Errors
    /// Returns `Validation` for a blank title and `NotFound` for an unknown id.
    pub async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> ChatResult<UpdateTitleResponse> {
        let body = UpdateTitleRequest {
            title: Some(title.to_string()),
        };
        self.send_json(Method::PUT, &["conversations", id.as_str()], &body, id.as_str())
            .await
    }

    /// Delete a conversation and its messages.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id.
    pub async fn delete_conversation(&self, id: &ConversationId) -> ChatResult<()> {
        let response = self
            .request(Method::DELETE, &["conversations", id.as_str()])?
            .send()
            .await?;
        let confirmation: DeleteResponse = decode(response, id.as_str()).await?;
        debug!(conversation_id = %id, "{}", confirmation.message);
        Ok(())
    }

    /// Post a user message and receive the stored pair.
    ///
    /// # Errors
    /// Returns `Validation` for blank content and `NotFound` for an unknown id.
    pub async fn post_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> ChatResult<MessageExchange> {
        let body = PostMessageRequest {
            content: Some(content.to_string()),
        };
        self.send_json(
            Method::POST,
            &["conversations", id.as_str(), "messages"],
            &body,
            id.as_str(),
        )
        .await
    }

    /// Messages of a conversation, oldest first.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn list_messages(&self, id: &ConversationId) -> ChatResult<Vec<MessageRecord>> {
        let response = self
            .request(Method::GET, &["conversations", id.as_str(), "messages"])?
            .send()
            .await?;
        let list: MessageList = decode(response, id.as_str()).await?;
        Ok(list.messages)
    }

    fn endpoint(&self, segments: &[&str]) -> ChatResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ChatError::InvalidConfig(format!("invalid api url: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ChatResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(%method, %url, "API request");
        Ok(self.client.request(method, url))
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
        subject: &str,
    ) -> ChatResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.request(method, segments)?.json(body).send().await?;
        decode(response, subject).await
    }
}

/// Decode a success body, or map an error response onto [`ChatError`].
async fn decode<T: DeserializeOwned>(response: Response, subject: &str) -> ChatResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(match status.as_u16() {
        400 => ChatError::Validation(message),
        404 => ChatError::conversation_not_found(subject),
        code => ChatError::Remote {
            status: code,
            message,
        },
    })
}
