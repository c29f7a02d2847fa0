//! Domain entities derived from server events and REST responses.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::value_object::{
    ConversationId, MessageId, MessageKind, NotificationId, PresenceStatus, UserId,
};

/// Last known liveness state of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub status: PresenceStatus,
    /// Only present while the identity is offline
    pub last_seen: Option<DateTime<Utc>>,
}

/// A single presence transition reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub user_id: UserId,
    pub status: PresenceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceUpdate {
    /// Turn the update into the record stored for the identity.
    ///
    /// `last_seen` is dropped for any status other than offline.
    pub fn into_record(self) -> (UserId, PresenceRecord) {
        let last_seen = if self.status.counts_as_online() {
            None
        } else {
            self.last_seen
        };
        (
            self.user_id,
            PresenceRecord {
                status: self.status,
                last_seen,
            },
        )
    }
}

/// A chat message as confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub kind: MessageKind,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Typing indicator broadcast for a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub is_typing: bool,
}

/// Read confirmation for messages of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub conversation_id: ConversationId,
    /// Identity that read the messages, when the server reports it
    pub reader_id: Option<UserId>,
    /// Restricts the receipt to these messages; `None` means the whole conversation
    pub message_ids: Option<Vec<MessageId>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Server-confirmed edit of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEdit {
    pub message_id: MessageId,
    pub conversation_id: Option<ConversationId>,
    pub content: String,
    pub edited_at: Option<DateTime<Utc>>,
}

/// Server-confirmed deletion of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDeletion {
    pub message_id: MessageId,
    pub conversation_id: Option<ConversationId>,
}

/// A discrete alert for the current identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

/// Authoritative notification list as returned by the REST collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

/// Point-in-time copy of the synchronizer state.
pub type NotificationSnapshot = NotificationPage;

/// Request to persist a new notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_id: Option<UserId>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Value,
}

/// Kind assigned to notifications synthesized from announcements.
pub const ANNOUNCEMENT_KIND: &str = "announcement";

/// Admin broadcast announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub target: String,
    pub priority: Option<String>,
}

impl Announcement {
    /// Fold the announcement into a regular unread notification.
    pub fn into_notification(self, id: NotificationId, received_at: DateTime<Utc>) -> Notification {
        let mut metadata = serde_json::Map::new();
        metadata.insert("target".to_string(), Value::String(self.target));
        if let Some(priority) = self.priority {
            metadata.insert("priority".to_string(), Value::String(priority));
        }

        Notification {
            id,
            kind: ANNOUNCEMENT_KIND.to_string(),
            title: self.title,
            message: self.message,
            link: self.link,
            read: false,
            created_at: Some(received_at),
            metadata: Value::Object(metadata),
        }
    }
}

/// Admin-issued forced logout command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceLogout {
    pub user_id: UserId,
    pub reason: Option<String>,
}
