//! HTTP API DTOs for the notification REST collaborator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::websocket::NotificationDto;

/// `GET notifications` response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    #[serde(default)]
    pub notifications: Vec<NotificationDto>,
    /// Authoritative unread count; recomputed from the list when absent
    #[serde(default)]
    pub unread_count: Option<i64>,
}

/// `POST notifications` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}
