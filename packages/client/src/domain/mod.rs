//! Domain layer: value objects, entities, gateway traits and pure policies.
//!
//! Nothing in here touches the network; infrastructure adapters implement the
//! gateway traits and the realtime components depend only on this module.

pub mod entity;
pub mod error;
pub mod gateway;
pub mod reconnect;
pub mod value_object;

pub use entity::{
    Announcement, ForceLogout, Message, MessageDeletion, MessageEdit, NewNotification,
    Notification, NotificationPage, NotificationSnapshot, PresenceRecord, PresenceUpdate,
    ReadReceipt, TypingIndicator,
};
pub use error::{ApiError, TransportError, ValueObjectError};
pub use gateway::{CredentialStore, Navigator, NotificationApi, Transport, TransportLink};
pub use reconnect::ReconnectPolicy;
pub use value_object::{
    ConversationId, MessageId, MessageKind, NotificationId, PresenceStatus, Role, UserId,
};
