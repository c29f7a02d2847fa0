//! Event formatting utilities for console display.

use chrono::{DateTime, Utc};
use estate_shared::time::format_rfc3339;

use crate::domain::{
    Message, MessageDeletion, MessageEdit, MessageKind, Notification, NotificationSnapshot,
    PresenceStatus, ReadReceipt, TypingIndicator, UserId,
};

const RULE: &str = "------------------------------------------------------------";
const DOUBLE_RULE: &str = "============================================================";

/// Formatter for realtime events shown in the console
pub struct EventFormatter;

impl EventFormatter {
    pub fn format_connected(identity: &UserId) -> String {
        format!("\n* connected as '{}'\n", identity)
    }

    pub fn format_disconnected(reason: &str) -> String {
        format!("\n* disconnected ({})\n", reason)
    }

    pub fn format_connection_error(message: &str) -> String {
        format!("\n! connection error: {}\n", message)
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The message confirmed by the server
    /// * `me` - The current identity (to mark own messages)
    ///
    /// # Returns
    ///
    /// A formatted string with the chat message
    pub fn format_message(message: &Message, me: &UserId) -> String {
        let me_suffix = if &message.sender_id == me { " (me)" } else { "" };
        let kind_prefix = match message.kind {
            MessageKind::Text => String::new(),
            other => format!("[{}] ", other),
        };
        format!(
            "\n\n{RULE}\n\
             #{} @{}{}: {}{}\n\
             id {} / sent at {}\n\
             {RULE}\n",
            message.conversation_id,
            message.sender_id,
            me_suffix,
            kind_prefix,
            message.content,
            message.id,
            format_optional_time(message.created_at.as_ref()),
        )
    }

    pub fn format_typing(indicator: &TypingIndicator) -> String {
        if indicator.is_typing {
            format!("\n… {} is typing in #{}\n", indicator.user_id, indicator.conversation_id)
        } else {
            format!("\n… {} stopped typing in #{}\n", indicator.user_id, indicator.conversation_id)
        }
    }

    pub fn format_read_receipt(receipt: &ReadReceipt) -> String {
        let reader = receipt
            .reader_id
            .as_ref()
            .map_or("someone".to_string(), UserId::to_string);
        let scope = match &receipt.message_ids {
            Some(ids) => format!("{} message(s)", ids.len()),
            None => "all messages".to_string(),
        };
        format!(
            "\n✓ {} read {} in #{}\n",
            reader, scope, receipt.conversation_id
        )
    }

    pub fn format_edited(edit: &MessageEdit) -> String {
        format!("\n✎ message {} edited: {}\n", edit.message_id, edit.content)
    }

    pub fn format_deleted(deletion: &MessageDeletion) -> String {
        format!("\n✗ message {} deleted\n", deletion.message_id)
    }

    /// Format the list of online users
    ///
    /// # Arguments
    ///
    /// * `online` - Identities currently online
    /// * `me` - The current identity (to mark as "me")
    ///
    /// # Returns
    ///
    /// A formatted string with the online list
    pub fn format_online_users(online: &[UserId], me: &UserId) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{DOUBLE_RULE}\n"));
        output.push_str("Online:\n");

        if online.is_empty() {
            output.push_str("(Nobody online)\n");
        } else {
            for user_id in online {
                let me_suffix = if user_id == me { " (me)" } else { "" };
                output.push_str(&format!("{}{}\n", user_id, me_suffix));
            }
        }

        output.push_str(&format!("{DOUBLE_RULE}\n"));
        output
    }

    pub fn format_presence(
        user_id: &UserId,
        status: PresenceStatus,
        last_seen: Option<&DateTime<Utc>>,
    ) -> String {
        match (status, last_seen) {
            (PresenceStatus::Offline, Some(last_seen)) => format!(
                "{} is offline, last seen {}\n",
                user_id,
                format_rfc3339(last_seen)
            ),
            _ => format!("{} is {}\n", user_id, status),
        }
    }

    pub fn format_notification(notification: &Notification) -> String {
        let marker = if notification.read { " " } else { "●" };
        let link = notification
            .link
            .as_deref()
            .map(|link| format!(" <{}>", link))
            .unwrap_or_default();
        format!(
            "{} [{}] {}: {}{} ({})\n",
            marker,
            notification.kind,
            notification.title,
            notification.message,
            link,
            notification.id
        )
    }

    pub fn format_notifications(snapshot: &NotificationSnapshot) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{DOUBLE_RULE}\n"));
        output.push_str(&format!("Notifications ({} unread):\n", snapshot.unread_count));

        if snapshot.notifications.is_empty() {
            output.push_str("(No notifications)\n");
        } else {
            for notification in &snapshot.notifications {
                output.push_str(&Self::format_notification(notification));
            }
        }

        output.push_str(&format!("{DOUBLE_RULE}\n"));
        output
    }

    pub fn format_pushed_notification(notification: &Notification) -> String {
        format!("\n🔔 {}", Self::format_notification(notification))
    }

    pub fn format_error(error: &dyn std::fmt::Display) -> String {
        format!("! {}\n", error)
    }
}

fn format_optional_time(instant: Option<&DateTime<Utc>>) -> String {
    instant.map_or_else(|| "unknown time".to_string(), format_rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConversationId, MessageId, NotificationId, NotificationPage};
    use estate_shared::time::utc_from_millis;
    use serde_json::Value;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn message(sender: &str, kind: MessageKind) -> Message {
        Message {
            id: MessageId::new("m1").unwrap(),
            conversation_id: ConversationId::new("c1").unwrap(),
            sender_id: user(sender),
            content: "Is the flat still available?".to_string(),
            kind,
            read: false,
            created_at: utc_from_millis(1672498800000),
        }
    }

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id).unwrap(),
            kind: "message".to_string(),
            title: "New message".to_string(),
            message: "alice wrote to you".to_string(),
            link: Some("/messages/c1".to_string()),
            read,
            created_at: None,
            metadata: Value::Null,
        }
    }

    #[test]
    fn test_format_own_message() {
        // テスト項目: 自分のメッセージには (me) が付き、送信時刻が表示される
        // given (前提条件):
        let message = message("alice", MessageKind::Text);

        // when (操作):
        let result = EventFormatter::format_message(&message, &user("alice"));

        // then (期待する結果):
        assert!(result.contains("#c1 @alice (me): Is the flat still available?"));
        assert!(result.contains("2022-12-31T15:00:00Z"));
        assert!(result.contains(RULE));
    }

    #[test]
    fn test_format_image_message_from_other() {
        // テスト項目: 他人の画像メッセージには種別が表示され (me) は付かない
        // given (前提条件):
        let message = message("bob", MessageKind::Image);

        // when (操作):
        let result = EventFormatter::format_message(&message, &user("alice"));

        // then (期待する結果):
        assert!(result.contains("@bob: [image] "));
        assert!(!result.contains("(me)"));
    }

    #[test]
    fn test_format_online_users_empty() {
        // テスト項目: オンラインユーザーが居ない場合、その旨が表示される
        // given (前提条件):
        let online = vec![];

        // when (操作):
        let result = EventFormatter::format_online_users(&online, &user("alice"));

        // then (期待する結果):
        assert!(result.contains("Online:"));
        assert!(result.contains("(Nobody online)"));
    }

    #[test]
    fn test_format_online_users_marks_me() {
        // テスト項目: オンライン一覧で自分にはマークが付く
        // given (前提条件):
        let online = vec![user("alice"), user("bob")];

        // when (操作):
        let result = EventFormatter::format_online_users(&online, &user("alice"));

        // then (期待する結果):
        assert!(result.contains("alice (me)"));
        assert!(result.contains("bob\n"));
    }

    #[test]
    fn test_format_presence_with_last_seen() {
        // テスト項目: オフラインのユーザーは最終オンライン時刻付きで表示される
        // given (前提条件):
        let last_seen = utc_from_millis(1672498800000).unwrap();

        // when (操作):
        let offline =
            EventFormatter::format_presence(&user("bob"), PresenceStatus::Offline, Some(&last_seen));
        let away = EventFormatter::format_presence(&user("bob"), PresenceStatus::Away, None);

        // then (期待する結果):
        assert_eq!(offline, "bob is offline, last seen 2022-12-31T15:00:00Z\n");
        assert_eq!(away, "bob is away\n");
    }

    #[test]
    fn test_format_notifications_with_unread_marker() {
        // テスト項目: 通知一覧には未読数と未読マークが表示される
        // given (前提条件):
        let snapshot = NotificationPage {
            notifications: vec![notification("n1", false), notification("n2", true)],
            unread_count: 1,
        };

        // when (操作):
        let result = EventFormatter::format_notifications(&snapshot);

        // then (期待する結果):
        assert!(result.contains("Notifications (1 unread):"));
        assert!(result.contains("● [message] New message: alice wrote to you </messages/c1> (n1)"));
        assert!(result.contains("  [message] New message"));
    }

    #[test]
    fn test_format_empty_notifications() {
        // テスト項目: 通知が無い場合、その旨が表示される
        // given (前提条件):
        let snapshot = NotificationPage::default();

        // when (操作):
        let result = EventFormatter::format_notifications(&snapshot);

        // then (期待する結果):
        assert!(result.contains("(No notifications)"));
        assert!(result.contains("0 unread"));
    }

    #[test]
    fn test_format_read_receipt() {
        // テスト項目: 既読通知は既読者と対象件数を表示する
        // given (前提条件):
        let receipt = ReadReceipt {
            conversation_id: ConversationId::new("c1").unwrap(),
            reader_id: Some(user("bob")),
            message_ids: Some(vec![MessageId::new("m1").unwrap()]),
            read_at: None,
        };

        // when (操作):
        let result = EventFormatter::format_read_receipt(&receipt);

        // then (期待する結果):
        assert!(result.contains("bob read 1 message(s) in #c1"));
    }
}
