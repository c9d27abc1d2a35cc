//! HTTP route handlers for the conversation API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::chat::core::errors::ChatError;
use crate::chat::core::ids::ConversationId;

use super::service::{ConversationDetail, ConversationRecord, MessageExchange, MessageRecord};
use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation)
                .put(update_title)
                .delete(delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(list_messages).post(post_message),
        )
        .fallback(not_found)
        .with_state(state)
}

/// Error response with an `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if !err.is_client_error() {
            error!("Request failed: {err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Current server time.
    pub server_time: DateTime<Utc>,
}

/// Create-conversation request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional title; blank means the default title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Rename request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateTitleRequest {
    /// New title.
    #[serde(default)]
    pub title: Option<String>,
}

/// Rename response.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTitleResponse {
    /// Conversation id.
    pub id: ConversationId,
    /// Stored title.
    pub title: String,
}

/// Post-message request.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PostMessageRequest {
    /// Message text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Conversation list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationList {
    /// Conversations, newest first.
    pub conversations: Vec<ConversationRecord>,
}

/// Message list response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageList {
    /// Messages, oldest first.
    pub messages: Vec<MessageRecord>,
}

/// Delete confirmation.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Confirmation text.
    pub message: String,
}

fn conversation_id(raw: &str) -> ApiResult<ConversationId> {
    ConversationId::parse(raw).map_err(|_| ChatError::conversation_not_found(raw).into())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        server_time: Utc::now(),
    })
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found".to_string(),
    }
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ConversationDetail>)> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => CreateConversationRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };

    let detail = state.service.create_conversation(request.title).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ConversationList>> {
    let conversations = state.service.list_conversations().await?;
    Ok(Json(ConversationList { conversations }))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationDetail>> {
    let id = conversation_id(&id)?;
    Ok(Json(state.service.get_conversation(&id).await?))
}

async fn update_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateTitleRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateTitleResponse>> {
    let Json(request) = body?;
    let id = conversation_id(&id)?;
    let title = request.title.unwrap_or_default();

    let record = state.service.update_title(&id, &title).await?;
    Ok(Json(UpdateTitleResponse {
        id: record.id,
        title: record.title,
    }))
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = conversation_id(&id)?;
    state.service.delete_conversation(&id).await?;
    Ok(Json(DeleteResponse {
        message: "Conversation deleted successfully".to_string(),
    }))
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageExchange>)> {
    let Json(request) = body?;
    let id = conversation_id(&id)?;
    let content = request.content.unwrap_or_default();

    let exchange = state.service.post_message(&id, &content).await?;
    Ok((StatusCode::CREATED, Json(exchange)))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageList>> {
    let id = conversation_id(&id)?;
    let messages = state.service.list_messages(&id).await?;
    Ok(Json(MessageList { messages }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use serde_json::{Value, json};
    use tokio_rusqlite::Connection;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::core::conversation::WELCOME_MESSAGE;
    use crate::chat::responder::{KeywordResponder, Responder};
    use crate::server::service::ServerConversationService;

    async fn router() -> Router {
        let conn = Connection::open_in_memory().await.unwrap();
        let service = ServerConversationService::with_connection(
            Arc::new(conn),
            Arc::new(KeywordResponder::new()),
        )
        .await
        .unwrap();
        create_router(AppState::new(service))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create(app: &Router) -> String {
        let (_, body) = send(app, Method::POST, "/api/conversations", Some(json!({}))).await;
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_returns_welcome() {
        let app = router().await;
        let (status, body) = send(&app, Method::POST, "/api/conversations", Some(json!({}))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "New Conversation");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["sender"], "bot");
        assert_eq!(messages[0]["content"], WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_create_without_body() {
        let app = router().await;
        let (status, body) = send(&app, Method::POST, "/api/conversations", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["title"], "New Conversation");
    }

    #[tokio::test]
    async fn test_post_message_uses_responder() {
        let app = router().await;
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/conversations/{id}/messages"),
            Some(json!({ "content": "hi" })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["userMessage"]["content"], "hi");
        assert_eq!(
            body["botMessage"]["content"],
            KeywordResponder::new().generate("hi")
        );
        assert_eq!(body["botMessage"]["conversation_id"], id.as_str());
    }

    #[tokio::test]
    async fn test_post_message_errors() {
        let app = router().await;
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/conversations/{id}/messages"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/conversations/unknown/messages",
            Some(json!({ "content": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = router().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/conversations")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rename_and_list() {
        let app = router().await;
        let id = create(&app).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/conversations/{id}"),
            Some(json!({ "title": "Groceries" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": id, "title": "Groceries" }));

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/conversations/{id}"),
            Some(json!({ "title": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, Method::GET, "/api/conversations", None).await;
        assert_eq!(body["conversations"][0]["title"], "Groceries");
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let app = router().await;
        let id = create(&app).await;
        let uri = format!("/api/conversations/{id}");

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::GET, &format!("{uri}/messages"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ChatError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ChatError::conversation_not_found("abc"), StatusCode::NOT_FOUND),
            (ChatError::transaction("busy"), StatusCode::INTERNAL_SERVER_ERROR),
            (ChatError::Exhausted, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_health_and_unknown_route() {
        let app = router().await;
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, Method::GET, "/api/nothing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Not found" }));
    }
}
