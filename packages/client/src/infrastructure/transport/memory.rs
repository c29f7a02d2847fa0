//! プロセス内チャンネルを使った Transport 実装
//!
//! サーバー側の端点（`MemoryPeer`）をテストコードに渡し、実際のネットワーク無しで
//! 接続・イベント配信・切断を再現します。接続試行回数を数えられるため、
//! 「アイデンティティ遷移ごとに接続サイクルは 1 回だけ」という不変条件の検証に使います。

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    domain::{Transport, TransportError, TransportLink},
    infrastructure::dto::websocket::Envelope,
};

/// In-process transport; every successful `connect` hands a peer to the paired `MemoryServer`.
pub struct MemoryTransport {
    attempts: AtomicUsize,
    refusals: Mutex<VecDeque<TransportError>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Server side of a `MemoryTransport`.
pub struct MemoryServer {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// Server end of one established link.
pub struct MemoryPeer {
    pub credential: Option<String>,
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryServer) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        (
            Self {
                attempts: AtomicUsize::new(0),
                refusals: Mutex::new(VecDeque::new()),
                peers: peers_tx,
            },
            MemoryServer { peers: peers_rx },
        )
    }

    /// Number of `connect` calls so far, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make the next `connect` call fail with `error`.
    pub fn refuse_next(&self, error: TransportError) {
        self.refusals.lock().push_back(error);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, credential: Option<&str>) -> Result<TransportLink, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.refusals.lock().pop_front() {
            return Err(error);
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            credential: credential.map(str::to_string),
            to_client,
            from_client,
        };
        self.peers
            .send(peer)
            .map_err(|_| TransportError::Connect("memory server is gone".to_string()))?;

        Ok(TransportLink { outbound, inbound })
    }
}

impl MemoryServer {
    /// Wait for the next established link.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// Return an already established link without waiting.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

impl MemoryPeer {
    /// Push a server event to the client. Returns `false` once the client side is gone.
    pub fn push<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> bool {
        let Ok(data) = serde_json::to_value(payload) else {
            return false;
        };
        let envelope = Envelope {
            event: event.to_string(),
            data,
        };
        match serde_json::to_string(&envelope) {
            Ok(frame) => self.push_raw(frame),
            Err(_) => false,
        }
    }

    /// Push a raw text frame, bypassing envelope encoding.
    pub fn push_raw(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).is_ok()
    }

    /// Wait for the next frame sent by the client, decoded as an envelope.
    ///
    /// Returns `None` once the client closed the link.
    pub async fn next_event(&mut self) -> Option<Envelope> {
        while let Some(frame) = self.from_client.recv().await {
            if let Ok(envelope) = serde_json::from_str(&frame) {
                return Some(envelope);
            }
        }
        None
    }

    /// Return the next already-sent client frame without waiting.
    pub fn try_next_event(&mut self) -> Option<Envelope> {
        while let Ok(frame) = self.from_client.try_recv() {
            if let Ok(envelope) = serde_json::from_str(&frame) {
                return Some(envelope);
            }
        }
        None
    }

    /// Whether the client has closed its end of the link.
    pub fn is_closed_by_client(&self) -> bool {
        self.from_client.is_closed()
    }
}
