//! WebSocket を使った Transport 実装
//!
//! ## 責務
//!
//! - WebSocket ハンドシェイク（資格情報があれば `Authorization: Bearer` ヘッダを付与）
//! - ソケットを読み取りタスクと書き込みタスクに分割し、テキストフレームをチャンネルで中継
//!
//! 再接続やイベントの解釈は `ConnectionManager` の責務であり、ここでは行いません。

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message,
    },
};

use crate::domain::{Transport, TransportError, TransportLink};

/// WebSocket transport for a fixed server URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Build the handshake request, attaching the bearer credential when present.
pub fn build_request(url: &str, credential: Option<&str>) -> Result<Request, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    if let Some(token) = credential {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| TransportError::Connect(format!("invalid credential: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    Ok(request)
}

/// Map handshake failures: 401/403 responses are rejections, everything else is retryable.
fn classify_error(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            TransportError::Rejected(format!("handshake returned {}", response.status()))
        }
        other => TransportError::Connect(other.to_string()),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, credential: Option<&str>) -> Result<TransportLink, TransportError> {
        let request = build_request(&self.url, credential)?;
        let (ws_stream, _response) = connect_async(request).await.map_err(classify_error)?;
        tracing::debug!("WebSocket handshake with {} completed", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        // Outbound: forward frames until the link owner drops its sender, then close
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    tracing::warn!("Failed to send frame: {}", e);
                    break;
                }
            }
            write.close().await.ok();
        });

        // Inbound: forward text frames until the socket closes
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        tracing::debug!("Ignoring binary frame ({} bytes)", data.len());
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
