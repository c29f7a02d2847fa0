//! Conversion logic between DTOs and domain entities.
//!
//! Inbound conversions are fallible: payloads with missing identifiers are
//! rejected so callers can skip them with a warning.

use crate::domain::{
    entity::{
        Announcement, ForceLogout, Message, MessageDeletion, MessageEdit, NewNotification,
        Notification, NotificationPage, PresenceUpdate, ReadReceipt, TypingIndicator,
    },
    error::ValueObjectError,
    value_object::{
        ConversationId, MessageId, MessageKind, NotificationId, PresenceStatus, UserId,
    },
};
use crate::infrastructure::dto::{http, websocket as dto};

use dto::resolve_timestamp;

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<dto::UserStatusDto> for PresenceUpdate {
    type Error = ValueObjectError;

    fn try_from(dto: dto::UserStatusDto) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(dto.user_id)?,
            status: dto.status.parse::<PresenceStatus>()?,
            last_seen: resolve_timestamp(&dto.last_seen),
        })
    }
}

impl TryFrom<dto::UserOnlinePayload> for PresenceUpdate {
    type Error = ValueObjectError;

    fn try_from(dto: dto::UserOnlinePayload) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(dto.user_id)?,
            status: PresenceStatus::Online,
            last_seen: None,
        })
    }
}

impl TryFrom<dto::UserOfflinePayload> for PresenceUpdate {
    type Error = ValueObjectError;

    fn try_from(dto: dto::UserOfflinePayload) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(dto.user_id)?,
            status: PresenceStatus::Offline,
            last_seen: resolve_timestamp(&dto.last_seen),
        })
    }
}

impl TryFrom<dto::MessageDto> for Message {
    type Error = ValueObjectError;

    fn try_from(dto: dto::MessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MessageId::new(dto.id)?,
            conversation_id: ConversationId::new(dto.conversation_id)?,
            sender_id: UserId::new(dto.sender_id)?,
            content: dto.content,
            kind: dto
                .kind
                .as_deref()
                .map(MessageKind::parse_lenient)
                .unwrap_or_default(),
            read: dto.read,
            created_at: resolve_timestamp(&dto.created_at),
        })
    }
}

impl TryFrom<dto::TypingPayload> for TypingIndicator {
    type Error = ValueObjectError;

    fn try_from(dto: dto::TypingPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            conversation_id: ConversationId::new(dto.conversation_id)?,
            user_id: UserId::new(dto.user_id)?,
            is_typing: dto.is_typing,
        })
    }
}

impl TryFrom<dto::MessagesReadPayload> for ReadReceipt {
    type Error = ValueObjectError;

    fn try_from(dto: dto::MessagesReadPayload) -> Result<Self, Self::Error> {
        // Blank reader / message ids are dropped rather than failing the whole receipt
        let reader_id = dto.user_id.and_then(|id| UserId::new(id).ok());
        let message_ids = dto
            .message_ids
            .map(|ids| ids.into_iter().filter_map(|id| MessageId::new(id).ok()).collect());

        Ok(Self {
            conversation_id: ConversationId::new(dto.conversation_id)?,
            reader_id,
            message_ids,
            read_at: resolve_timestamp(&dto.read_at),
        })
    }
}

impl TryFrom<dto::MessageEditedPayload> for MessageEdit {
    type Error = ValueObjectError;

    fn try_from(dto: dto::MessageEditedPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            message_id: MessageId::new(dto.message_id)?,
            conversation_id: dto.conversation_id.and_then(|id| ConversationId::new(id).ok()),
            content: dto.content,
            edited_at: resolve_timestamp(&dto.edited_at),
        })
    }
}

impl TryFrom<dto::MessageDeletedPayload> for MessageDeletion {
    type Error = ValueObjectError;

    fn try_from(dto: dto::MessageDeletedPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            message_id: MessageId::new(dto.message_id)?,
            conversation_id: dto.conversation_id.and_then(|id| ConversationId::new(id).ok()),
        })
    }
}

impl TryFrom<dto::NotificationDto> for Notification {
    type Error = ValueObjectError;

    fn try_from(dto: dto::NotificationDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: NotificationId::new(dto.id)?,
            kind: dto.kind,
            title: dto.title,
            message: dto.message,
            link: dto.link.filter(|link| !link.trim().is_empty()),
            read: dto.read,
            created_at: resolve_timestamp(&dto.created_at),
            metadata: dto.metadata,
        })
    }
}

impl From<dto::AnnouncementPayload> for Announcement {
    fn from(dto: dto::AnnouncementPayload) -> Self {
        Self {
            title: dto.title,
            message: dto.message,
            link: dto.link.filter(|link| !link.trim().is_empty()),
            target: dto.target,
            priority: dto.priority,
        }
    }
}

impl TryFrom<dto::ForceLogoutPayload> for ForceLogout {
    type Error = ValueObjectError;

    fn try_from(dto: dto::ForceLogoutPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId::new(dto.user_id)?,
            reason: dto.reason,
        })
    }
}

impl From<http::NotificationListResponse> for NotificationPage {
    fn from(response: http::NotificationListResponse) -> Self {
        let notifications: Vec<Notification> = response
            .notifications
            .into_iter()
            .filter_map(|dto| match Notification::try_from(dto) {
                Ok(notification) => Some(notification),
                Err(e) => {
                    tracing::warn!("Skipping malformed notification: {}", e);
                    None
                }
            })
            .collect();

        let unread_count = match response.unread_count {
            Some(count) => usize::try_from(count.max(0)).unwrap_or_default(),
            None => notifications.iter().filter(|n| !n.read).count(),
        };

        Self {
            notifications,
            unread_count,
        }
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&NewNotification> for http::CreateNotificationRequest {
    fn from(model: &NewNotification) -> Self {
        Self {
            recipient_id: model.recipient_id.as_ref().map(|id| id.as_str().to_string()),
            kind: model.kind.clone(),
            title: model.title.clone(),
            message: model.message.clone(),
            link: model.link.clone(),
            metadata: model.metadata.clone(),
        }
    }
}
