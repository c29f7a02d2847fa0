//! Messaging Channel: conversation rooms and message requests.
//!
//! Requests are fire-and-forget. The local message log changes only when the
//! server confirms a change, never pre-emptively.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    domain::{
        ConversationId, Message, MessageDeletion, MessageEdit, MessageId, MessageKind,
        ReadReceipt, TypingIndicator, UserId,
    },
    infrastructure::dto::websocket::{
        DeleteMessageRequest, DisconnectPayload, EditMessageRequest, MarkAsReadRequest,
        MessageDeletedPayload, MessageDto, MessageEditedPayload, MessagesReadPayload,
        SendMessageRequest, TypingPayload, TypingRequest, events,
    },
};

use super::{
    connection::REASON_TRANSPORT_CLOSE,
    router::{EventHandler, EventRouter, Handler, Subscription},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Defaults to `text`
    pub kind: Option<MessageKind>,
}

#[derive(Debug, Default)]
struct RoomMembership {
    owner: Option<UserId>,
    joined: HashSet<ConversationId>,
    /// Joins still to be (re)sent once the link is up
    rejoin_pending: bool,
    /// Follows the `connect`/`disconnect` events seen by this channel
    link_up: bool,
}

impl RoomMembership {
    fn clear(&mut self) {
        self.owner = None;
        self.joined.clear();
        self.rejoin_pending = false;
        self.link_up = false;
    }

    /// Rooms joined by another identity do not carry over.
    fn claim(&mut self, identity: Option<UserId>) {
        let Some(identity) = identity else {
            return;
        };
        if self.owner.as_ref().is_some_and(|owner| owner != &identity) {
            self.joined.clear();
            self.rejoin_pending = false;
        }
        self.owner = Some(identity);
    }
}

#[derive(Debug, Default)]
struct MessageLog {
    conversations: HashMap<ConversationId, Vec<Message>>,
}

impl MessageLog {
    fn upsert(&mut self, message: Message) {
        let messages = self
            .conversations
            .entry(message.conversation_id.clone())
            .or_default();
        match messages.iter_mut().find(|existing| existing.id == message.id) {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
    }

    fn find_mut(
        &mut self,
        message_id: &MessageId,
        conversation_id: Option<&ConversationId>,
    ) -> Option<&mut Message> {
        match conversation_id {
            Some(conversation_id) => self
                .conversations
                .get_mut(conversation_id)?
                .iter_mut()
                .find(|message| &message.id == message_id),
            None => self
                .conversations
                .values_mut()
                .flat_map(|messages| messages.iter_mut())
                .find(|message| &message.id == message_id),
        }
    }

    fn apply_edit(&mut self, edit: &MessageEdit) {
        match self.find_mut(&edit.message_id, edit.conversation_id.as_ref()) {
            Some(message) => message.content = edit.content.clone(),
            None => tracing::debug!("Edit for unknown message '{}'", edit.message_id),
        }
    }

    fn remove(&mut self, deletion: &MessageDeletion) {
        for (conversation_id, messages) in self.conversations.iter_mut() {
            if deletion
                .conversation_id
                .as_ref()
                .is_some_and(|target| target != conversation_id)
            {
                continue;
            }
            messages.retain(|message| message.id != deletion.message_id);
        }
    }

    fn apply_read(&mut self, receipt: &ReadReceipt) {
        let Some(messages) = self.conversations.get_mut(&receipt.conversation_id) else {
            return;
        };
        for message in messages.iter_mut() {
            if receipt
                .reader_id
                .as_ref()
                .is_some_and(|reader| reader == &message.sender_id)
            {
                continue;
            }
            if receipt
                .message_ids
                .as_ref()
                .is_some_and(|ids| !ids.contains(&message.id))
            {
                continue;
            }
            message.read = true;
        }
    }

    fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.conversations
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

pub struct MessagingChannel {
    router: Arc<EventRouter>,
    membership: Arc<Mutex<RoomMembership>>,
    log: Arc<Mutex<MessageLog>>,
    subscriptions: Vec<Subscription>,
}

impl MessagingChannel {
    pub fn new(router: Arc<EventRouter>) -> Self {
        let membership = Arc::new(Mutex::new(RoomMembership::default()));
        let log = Arc::new(Mutex::new(MessageLog::default()));
        let mut subscriptions = Vec::new();

        // Registered before any caller handler, so callbacks observe the updated log
        let message_log = log.clone();
        let on_message: Handler<Message> = Arc::new(move |message: Message| {
            message_log.lock().upsert(message);
        });
        subscriptions.push(router.on_decoded::<MessageDto, Message>(events::NEW_MESSAGE, on_message));

        let read_log = log.clone();
        let on_read: Handler<ReadReceipt> = Arc::new(move |receipt: ReadReceipt| {
            read_log.lock().apply_read(&receipt);
        });
        subscriptions.push(
            router.on_decoded::<MessagesReadPayload, ReadReceipt>(events::MESSAGES_READ, on_read),
        );

        let edit_log = log.clone();
        let on_edited: Handler<MessageEdit> = Arc::new(move |edit: MessageEdit| {
            edit_log.lock().apply_edit(&edit);
        });
        subscriptions.push(
            router.on_decoded::<MessageEditedPayload, MessageEdit>(events::MESSAGE_EDITED, on_edited),
        );

        let delete_log = log.clone();
        let on_deleted: Handler<MessageDeletion> = Arc::new(move |deletion: MessageDeletion| {
            delete_log.lock().remove(&deletion);
        });
        subscriptions.push(router.on_decoded::<MessageDeletedPayload, MessageDeletion>(
            events::MESSAGE_DELETED,
            on_deleted,
        ));

        let disconnect_membership = membership.clone();
        let on_disconnect: Handler<DisconnectPayload> =
            Arc::new(move |payload: DisconnectPayload| {
                let mut membership = disconnect_membership.lock();
                membership.link_up = false;
                if payload.reason == REASON_TRANSPORT_CLOSE {
                    membership.rejoin_pending = !membership.joined.is_empty();
                } else {
                    membership.clear();
                }
            });
        subscriptions.push(router.on_typed(events::DISCONNECT, on_disconnect));

        let connect_router = Arc::downgrade(&router);
        let connect_membership = membership.clone();
        let on_connect: EventHandler = Arc::new(move |_: &Value| {
            let Some(router) = connect_router.upgrade() else {
                return;
            };
            // Held while emitting: a concurrent `join` either lands in this batch or sees `link_up`
            let mut membership = connect_membership.lock();
            membership.claim(router.current_identity());
            membership.link_up = true;
            if !std::mem::take(&mut membership.rejoin_pending) {
                return;
            }
            let rooms = sorted(&membership.joined);
            tracing::info!("Re-joining {} conversation(s)", rooms.len());
            for room in &rooms {
                router.emit(events::JOIN_CONVERSATION, room.as_str());
            }
        });
        subscriptions.push(router.on(events::CONNECT, on_connect));

        // Already connected: the `connect` event has come and gone
        if router.is_connected() {
            membership.lock().link_up = true;
        }

        Self {
            router,
            membership,
            log,
            subscriptions,
        }
    }

    /// Join a conversation room. No-op when already joined.
    ///
    /// A join made while the link is down is only recorded, and sent once on `connect`.
    pub fn join(&self, conversation_id: &ConversationId) {
        let mut membership = self.membership.lock();
        membership.claim(self.router.current_identity());
        if !membership.joined.insert(conversation_id.clone()) {
            tracing::debug!("Already joined '{}'", conversation_id);
            return;
        }
        if !membership.link_up {
            tracing::debug!("Link down, deferring join of '{}'", conversation_id);
            membership.rejoin_pending = true;
            return;
        }
        self.router
            .emit(events::JOIN_CONVERSATION, conversation_id.as_str());
    }

    /// Leave a conversation room. No-op when not joined.
    ///
    /// While the link is down the room is only forgotten locally.
    pub fn leave(&self, conversation_id: &ConversationId) {
        let mut membership = self.membership.lock();
        if !membership.joined.remove(conversation_id) {
            tracing::debug!("Not in '{}', nothing to leave", conversation_id);
            return;
        }
        if !membership.link_up {
            return;
        }
        self.router
            .emit(events::LEAVE_CONVERSATION, conversation_id.as_str());
    }

    /// Request delivery of a message. The message appears locally once the server broadcasts it.
    pub fn send(
        &self,
        conversation_id: &ConversationId,
        content: impl Into<String>,
        options: SendOptions,
    ) {
        let request = SendMessageRequest {
            conversation_id: conversation_id.as_str().to_string(),
            content: content.into(),
            kind: options.kind.unwrap_or_default().as_str().to_string(),
        };
        self.router.emit(events::SEND_MESSAGE, &request);
    }

    /// Callers throttle repeated calls themselves.
    pub fn set_typing(&self, conversation_id: &ConversationId, is_typing: bool) {
        let request = TypingRequest {
            conversation_id: conversation_id.as_str().to_string(),
            is_typing,
        };
        self.router.emit(events::TYPING, &request);
    }

    pub fn mark_read(&self, conversation_id: &ConversationId) {
        let request = MarkAsReadRequest {
            conversation_id: conversation_id.as_str().to_string(),
        };
        self.router.emit(events::MARK_AS_READ, &request);
    }

    pub fn edit(&self, message_id: &MessageId, content: impl Into<String>) {
        let request = EditMessageRequest {
            message_id: message_id.as_str().to_string(),
            content: content.into(),
        };
        self.router.emit(events::EDIT_MESSAGE, &request);
    }

    pub fn delete(&self, message_id: &MessageId) {
        let request = DeleteMessageRequest {
            message_id: message_id.as_str().to_string(),
        };
        self.router.emit(events::DELETE_MESSAGE, &request);
    }

    pub fn on_message(&self, handler: Handler<Message>) -> Subscription {
        self.router
            .on_decoded::<MessageDto, Message>(events::NEW_MESSAGE, handler)
    }

    pub fn on_typing(&self, handler: Handler<TypingIndicator>) -> Subscription {
        self.router
            .on_decoded::<TypingPayload, TypingIndicator>(events::USER_TYPING, handler)
    }

    pub fn on_read(&self, handler: Handler<ReadReceipt>) -> Subscription {
        self.router
            .on_decoded::<MessagesReadPayload, ReadReceipt>(events::MESSAGES_READ, handler)
    }

    pub fn on_edited(&self, handler: Handler<MessageEdit>) -> Subscription {
        self.router
            .on_decoded::<MessageEditedPayload, MessageEdit>(events::MESSAGE_EDITED, handler)
    }

    pub fn on_deleted(&self, handler: Handler<MessageDeletion>) -> Subscription {
        self.router
            .on_decoded::<MessageDeletedPayload, MessageDeletion>(events::MESSAGE_DELETED, handler)
    }

    pub fn is_joined(&self, conversation_id: &ConversationId) -> bool {
        self.membership.lock().joined.contains(conversation_id)
    }

    pub fn joined_rooms(&self) -> Vec<ConversationId> {
        sorted(&self.membership.lock().joined)
    }

    /// Messages confirmed by the server for `conversation_id`, in arrival order.
    pub fn messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        self.log.lock().messages(conversation_id)
    }
}

impl Drop for MessagingChannel {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn sorted(rooms: &HashSet<ConversationId>) -> Vec<ConversationId> {
    let mut rooms: Vec<ConversationId> = rooms.iter().cloned().collect();
    rooms.sort();
    rooms
}
