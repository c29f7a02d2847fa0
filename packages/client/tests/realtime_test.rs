//! Integration tests for the realtime core against a real WebSocket server.
//!
//! Each test binds an in-process tokio-tungstenite server on an ephemeral port
//! and drives the core through its public API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::header::AUTHORIZATION,
        protocol::Message,
    },
};

use estate_realtime::{
    config::SyncConfig,
    domain::{
        ApiError, ConversationId, CredentialStore, Navigator, NewNotification, NotificationApi,
        NotificationId, NotificationPage, ReconnectPolicy, Role, UserId,
    },
    infrastructure::{credential::InMemoryCredentialStore, transport::WebSocketTransport},
    realtime::{CoreDependencies, RealtimeCore},
};
use estate_shared::time::SystemClock;

const TIMEOUT: Duration = Duration::from_secs(5);

/// In-process WebSocket server handing every accepted connection to the test
struct TestServer {
    url: String,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut authorization = None;
                let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    authorization = request
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    Ok(response)
                };
                let Ok(socket) = accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let connection = ServerConnection {
                    authorization,
                    socket,
                };
                if tx.send(connection).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{}/ws", port),
            connections,
        }
    }

    async fn accept(&mut self) -> ServerConnection {
        tokio::time::timeout(TIMEOUT, self.connections.recv())
            .await
            .expect("Timeout waiting for client connection")
            .expect("Server stopped")
    }
}

/// Server side of one client connection
struct ServerConnection {
    authorization: Option<String>,
    socket: WebSocketStream<TcpStream>,
}

impl ServerConnection {
    async fn push(&mut self, event: &str, data: Value) {
        let frame = json!({ "event": event, "data": data }).to_string();
        self.socket.send(Message::Text(frame.into())).await.unwrap();
    }

    /// Next envelope sent by the client, `None` once the client closed the socket
    async fn next_event(&mut self) -> Option<(String, Value)> {
        loop {
            let message = tokio::time::timeout(TIMEOUT, self.socket.next())
                .await
                .expect("Timeout waiting for client frame");
            match message {
                Some(Ok(Message::Text(text))) => {
                    let envelope: Value = serde_json::from_str(text.as_str()).unwrap();
                    let event = envelope["event"].as_str().unwrap_or_default().to_string();
                    return Some((event, envelope["data"].clone()));
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Notification API answering with an empty list
struct EmptyNotificationApi;

#[async_trait]
impl NotificationApi for EmptyNotificationApi {
    async fn list(&self) -> Result<NotificationPage, ApiError> {
        Ok(NotificationPage::default())
    }

    async fn mark_read(&self, _id: &NotificationId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn create(&self, _notification: &NewNotification) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect_to_login(&self, reason: &str) {
        self.redirects.lock().push(reason.to_string());
    }
}

struct TestClient {
    core: RealtimeCore,
    credentials: Arc<InMemoryCredentialStore>,
    navigator: Arc<RecordingNavigator>,
}

impl TestClient {
    fn new(url: &str, token: Option<&str>) -> Self {
        let config = SyncConfig {
            server_url: url.to_string(),
            reconnect: ReconnectPolicy {
                max_attempts: 3,
                interval: Duration::from_millis(50),
            },
            ..SyncConfig::default()
        };
        let credentials = Arc::new(InMemoryCredentialStore::new(token.map(str::to_string)));
        let navigator = Arc::new(RecordingNavigator::default());
        let core = RealtimeCore::new(
            &config,
            Role::new("buyer").unwrap(),
            CoreDependencies {
                transport: Arc::new(WebSocketTransport::new(config.server_url.clone())),
                api: Arc::new(EmptyNotificationApi),
                credentials: credentials.clone(),
                navigator: navigator.clone(),
                clock: Arc::new(SystemClock),
            },
        );
        Self {
            core,
            credentials,
            navigator,
        }
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn conversation(id: &str) -> ConversationId {
    ConversationId::new(id).unwrap()
}

/// Poll `condition` until it holds or the timeout expires
async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition not met before timeout");
}

#[tokio::test]
async fn test_handshake_carries_bearer_token() {
    // テスト項目: 資格情報がある場合、ハンドシェイクに Bearer トークンが付与される
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, Some("secret"));

    // when (操作):
    let connection = client.core.start(user("alice"));
    let peer = server.accept().await;

    // then (期待する結果):
    assert_eq!(peer.authorization.as_deref(), Some("Bearer secret"));
    eventually(|| connection.is_connected()).await;
}

#[tokio::test]
async fn test_anonymous_connection_without_token() {
    // テスト項目: 資格情報が無くても匿名で接続できる
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, None);

    // when (操作):
    let connection = client.core.start(user("guest"));
    let peer = server.accept().await;

    // then (期待する結果):
    assert_eq!(peer.authorization, None);
    eventually(|| connection.is_connected()).await;
}

#[tokio::test]
async fn test_presence_push_is_reflected() {
    // テスト項目: サーバーからのプレゼンス通知がトラッカーに反映される
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, Some("secret"));
    let connection = client.core.start(user("alice"));
    let mut peer = server.accept().await;
    eventually(|| connection.is_connected()).await;

    // when (操作):
    peer.push("presence:user-online", json!({"userId": "bob"})).await;
    peer.push(
        "presence:user-offline",
        json!({"userId": "carol", "lastSeen": "2024-05-01T10:00:00Z"}),
    )
    .await;

    // then (期待する結果):
    let presence = client.core.presence();
    eventually(|| presence.is_online(&user("bob"))).await;
    eventually(|| presence.last_seen_of(&user("carol")).is_some()).await;
    assert!(!presence.is_online(&user("carol")));
}

#[tokio::test]
async fn test_join_and_message_round_trip() {
    // テスト項目: join でサーバーに参加要求が届き、サーバーが配信したメッセージがログに載る
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, Some("secret"));
    let connection = client.core.start(user("alice"));
    let mut peer = server.accept().await;
    eventually(|| connection.is_connected()).await;

    // when (操作):
    client.core.messaging().join(&conversation("listing-42"));
    client
        .core
        .messaging()
        .send(&conversation("listing-42"), "Is it still available?", Default::default());

    // then (期待する結果):
    let (event, data) = peer.next_event().await.unwrap();
    assert_eq!(event, "join_conversation");
    assert_eq!(data, json!("listing-42"));
    let (event, data) = peer.next_event().await.unwrap();
    assert_eq!(event, "send_message");
    assert_eq!(data["type"], "text");
    assert!(client.core.messaging().messages(&conversation("listing-42")).is_empty());

    // when (操作):
    peer.push(
        "new_message",
        json!({
            "_id": "m1",
            "conversationId": "listing-42",
            "senderId": "alice",
            "content": "Is it still available?",
            "type": "text"
        }),
    )
    .await;

    // then (期待する結果):
    let messaging = client.core.messaging();
    eventually(|| messaging.messages(&conversation("listing-42")).len() == 1).await;
}

#[tokio::test]
async fn test_rooms_are_rejoined_after_server_drops_connection() {
    // テスト項目: サーバー側で接続が切れても自動再接続され、参加中のルームに再参加する
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, Some("secret"));
    let connection = client.core.start(user("alice"));
    let mut peer = server.accept().await;
    eventually(|| connection.is_connected()).await;
    client.core.messaging().join(&conversation("listing-42"));
    peer.next_event().await.unwrap();

    // when (操作):
    drop(peer);
    let mut peer = server.accept().await;

    // then (期待する結果):
    let (event, data) = peer.next_event().await.unwrap();
    assert_eq!(event, "join_conversation");
    assert_eq!(data, json!("listing-42"));
    assert_eq!(peer.authorization.as_deref(), Some("Bearer secret"));
}

#[tokio::test]
async fn test_force_logout_ends_session() {
    // テスト項目: 自分宛ての強制ログアウトで資格情報が消去され、接続が閉じられ、ログイン画面へ遷移する
    // given (前提条件):
    let mut server = TestServer::start().await;
    let client = TestClient::new(&server.url, Some("secret"));
    let connection = client.core.start(user("alice"));
    let mut peer = server.accept().await;
    eventually(|| connection.is_connected()).await;

    // when (操作):
    peer.push("admin:force_logout", json!({"userId": "bob"})).await;
    peer.push("admin:force_logout", json!({"userId": "alice"})).await;

    // then (期待する結果):
    let navigator = client.navigator.clone();
    eventually(|| !navigator.redirects.lock().is_empty()).await;
    assert_eq!(*navigator.redirects.lock(), vec!["force_logout".to_string()]);
    assert_eq!(client.credentials.token(), None);
    assert!(!client.core.router().is_connected());
    assert!(peer.next_event().await.is_none());
}
