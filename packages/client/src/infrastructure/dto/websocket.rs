//! WebSocket message DTOs.
//!
//! Every frame is a JSON envelope `{"event": ..., "data": ...}`. Payload keys
//! are camelCase. Fields default when missing so malformed payloads degrade
//! instead of failing to decode.

use chrono::{DateTime, Utc};
use estate_shared::time::{parse_rfc3339, utc_from_millis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names recognized or emitted by the core.
pub mod events {
    // synthesized locally by the connection manager
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const ERROR: &str = "error";

    // messaging (inbound)
    pub const NEW_MESSAGE: &str = "new_message";
    pub const USER_TYPING: &str = "user_typing";
    pub const MESSAGES_READ: &str = "messages_read";
    pub const MESSAGE_EDITED: &str = "message_edited";
    pub const MESSAGE_DELETED: &str = "message_deleted";

    // messaging (outbound)
    pub const JOIN_CONVERSATION: &str = "join_conversation";
    pub const LEAVE_CONVERSATION: &str = "leave_conversation";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const TYPING: &str = "typing";
    pub const MARK_AS_READ: &str = "mark_as_read";
    pub const EDIT_MESSAGE: &str = "edit_message";
    pub const DELETE_MESSAGE: &str = "delete_message";

    // presence
    pub const PRESENCE_USER_ONLINE: &str = "presence:user-online";
    pub const PRESENCE_USER_OFFLINE: &str = "presence:user-offline";
    pub const PRESENCE_STATUS_CHANGED: &str = "presence:status-changed";
    pub const PRESENCE_STATUS_RESPONSE: &str = "presence:status-response";
    pub const PRESENCE_HEARTBEAT: &str = "presence:heartbeat";
    pub const PRESENCE_UPDATE_STATUS: &str = "presence:update-status";
    pub const PRESENCE_GET_STATUS: &str = "presence:get-status";

    // notifications
    pub const NEW_NOTIFICATION: &str = "new_notification";
    pub const NEW_ANNOUNCEMENT: &str = "new_announcement";

    // admin
    pub const ADMIN_FORCE_LOGOUT: &str = "admin:force_logout";

    /// Names the server is not allowed to deliver, since they describe local link state.
    pub fn is_reserved(event: &str) -> bool {
        matches!(event, CONNECT | DISCONNECT | ERROR)
    }
}

/// Frame envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Timestamp as sent by the server: RFC 3339 text or Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
    Other(Value),
}

impl WireTimestamp {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(millis) => utc_from_millis(*millis),
            Self::Text(text) => parse_rfc3339(text),
            Self::Other(_) => None,
        }
    }
}

/// Resolve an optional wire timestamp, treating anything unparseable as absent.
pub fn resolve_timestamp(value: &Option<WireTimestamp>) -> Option<DateTime<Utc>> {
    value.as_ref().and_then(WireTimestamp::to_utc)
}

// ========================================
// Connection (local)
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisconnectPayload {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
}

// ========================================
// Presence
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOnlinePayload {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOfflinePayload {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub last_seen: Option<WireTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusDto {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_seen: Option<WireTimestamp>,
}

/// `presence:status-changed` carries the same shape as one status-response entry.
pub type StatusChangedPayload = UserStatusDto;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponsePayload {
    #[serde(default)]
    pub users: Vec<UserStatusDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatusRequest {
    pub user_ids: Vec<String>,
}

// ========================================
// Messaging
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<WireTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub is_typing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message_ids: Option<Vec<String>>,
    #[serde(default)]
    pub read_at: Option<WireTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEditedPayload {
    #[serde(default, alias = "id", alias = "_id")]
    pub message_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub edited_at: Option<WireTimestamp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    #[serde(default, alias = "id", alias = "_id")]
    pub message_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub conversation_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadRequest {
    pub conversation_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub message_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageRequest {
    pub message_id: String,
}

// ========================================
// Notifications
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, alias = "isRead")]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<WireTimestamp>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub priority: Option<String>,
}

// ========================================
// Admin
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLogoutPayload {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}
