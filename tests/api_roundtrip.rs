//! Runs the real server on an ephemeral port and drives it over HTTP.

use std::sync::Arc;

use glossy_chat::chat::core::conversation::{DEFAULT_TITLE, WELCOME_MESSAGE};
use glossy_chat::chat::core::{ChatError, ConversationId, Sender};
use glossy_chat::chat::responder::{KeywordResponder, Responder};
use glossy_chat::server::{self, AppState, ServerConversationService};
use glossy_chat::transport::HttpConversationClient;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    client: HttpConversationClient,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let service = ServerConversationService::open(
            dir.path().join("chatbot.db"),
            Arc::new(KeywordResponder::new()),
        )
        .await
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server::serve(listener, AppState::new(service), async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });

        let client = HttpConversationClient::new(&format!("http://{addr}/api")).unwrap();
        Self {
            client,
            shutdown: Some(tx),
            handle,
            _dir: dir,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_conversation_lifecycle_over_http() {
    let server = TestServer::start().await;
    let client = &server.client;

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");

    let created = client.create_conversation(None).await.unwrap();
    let id = created.conversation.id.clone();
    assert_eq!(created.conversation.title, DEFAULT_TITLE);
    assert_eq!(created.messages.len(), 1);
    assert_eq!(created.messages[0].sender, Sender::Bot);
    assert_eq!(created.messages[0].content, WELCOME_MESSAGE);

    let exchange = client.post_message(&id, "hi").await.unwrap();
    assert_eq!(exchange.user_message.content, "hi");
    assert_eq!(
        exchange.bot_message.content,
        KeywordResponder::new().generate("hi")
    );

    let detail = client.get_conversation(&id).await.unwrap();
    assert_eq!(detail.messages.len(), 3);
    assert_eq!(detail.conversation.title, "hi");

    let messages = client.list_messages(&id).await.unwrap();
    assert_eq!(messages, detail.messages);

    let renamed = client.update_title(&id, "Greetings").await.unwrap();
    assert_eq!(renamed.title, "Greetings");

    let other = client.create_conversation(Some("Second")).await.unwrap();
    let listed = client.list_conversations().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, other.conversation.id);

    client.delete_conversation(&id).await.unwrap();
    assert!(matches!(
        client.get_conversation(&id).await,
        Err(ChatError::NotFound { .. })
    ));
    assert!(client.list_messages(&id).await.unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_error_mapping_over_http() {
    let server = TestServer::start().await;
    let client = &server.client;
    let id = client.create_conversation(None).await.unwrap().conversation.id;

    assert!(matches!(
        client.post_message(&id, "   ").await,
        Err(ChatError::Validation(_))
    ));
    assert!(matches!(
        client.update_title(&id, "").await,
        Err(ChatError::Validation(_))
    ));

    let missing = ConversationId::new();
    assert!(matches!(
        client.delete_conversation(&missing).await,
        Err(ChatError::NotFound { .. })
    ));
    assert!(matches!(
        client.post_message(&missing, "hello").await,
        Err(ChatError::NotFound { .. })
    ));

    server.stop().await;
}
