//! reqwest を使った NotificationApi 実装
//!
//! バックエンド停止（接続失敗・タイムアウト・502/503/504）は `ApiError::Unavailable`
//! に分類され、呼び出し側は空の状態に縮退します。それ以外の失敗はそのまま返します。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use crate::{
    domain::{
        ApiError, CredentialStore, NewNotification, NotificationApi, NotificationId,
        NotificationPage,
    },
    infrastructure::dto::http::{CreateNotificationRequest, NotificationListResponse},
};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// REST client for the notification endpoints.
pub struct HttpNotificationApi {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpNotificationApi {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), body))
    }
}

fn classify_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_connect() || error.is_timeout() {
        ApiError::Unavailable(error.to_string())
    } else if error.is_decode() {
        ApiError::Decode(error.to_string())
    } else {
        ApiError::Request(error.to_string())
    }
}

/// Map a non-success status code to an `ApiError`.
///
/// Gateway errors mean the backend itself is unreachable.
pub fn classify_status(status: u16, message: String) -> ApiError {
    match status {
        502..=504 => ApiError::Unavailable(format!("status {}", status)),
        _ => ApiError::Status { status, message },
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self) -> Result<NotificationPage, ApiError> {
        let response = self.send(self.client.get(self.url("notifications"))).await?;
        let body: NotificationListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(body.into())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        let path = format!("notifications/{}/read", id);
        self.send(self.client.post(self.url(&path))).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.send(self.client.post(self.url("notifications/read-all")))
            .await?;
        Ok(())
    }

    async fn create(&self, notification: &NewNotification) -> Result<(), ApiError> {
        let body = CreateNotificationRequest::from(notification);
        self.send(self.client.post(self.url("notifications")).json(&body))
            .await?;
        Ok(())
    }
}
