//! Gateway trait 定義
//!
//! リアルタイムコアが必要とする外部コラボレーターのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `Transport`: 永続的な双方向接続（WebSocket など）
//! - `NotificationApi`: 通知一覧の REST API
//! - `CredentialStore`: 認証トークンの保管
//! - `Navigator`: ログイン画面への遷移

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    entity::{NewNotification, NotificationPage},
    error::{ApiError, TransportError},
    value_object::NotificationId,
};

/// One established duplex link, exchanged as raw text frames.
///
/// Dropping `outbound` closes the link; `inbound` yields `None` once the peer
/// or the network closes it.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Low-level connection factory used by the connection manager.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new link, authenticating with `credential` when one is available.
    async fn connect(&self, credential: Option<&str>) -> Result<TransportLink, TransportError>;
}

/// Notification REST collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET notifications`
    async fn list(&self) -> Result<NotificationPage, ApiError>;

    /// `POST notifications/:id/read`
    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError>;

    /// `POST notifications/read-all`
    async fn mark_all_read(&self) -> Result<(), ApiError>;

    /// `POST notifications`
    async fn create(&self, notification: &NewNotification) -> Result<(), ApiError>;
}

/// Opaque credential supplier.
pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Forget every locally stored session datum.
    fn clear(&self);
}

/// Navigation side effect triggered by session termination.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, reason: &str);
}
