//! Console command parsing.

use crate::{
    domain::{
        ConversationId, MessageId, MessageKind, NotificationId, PresenceStatus, UserId,
        ValueObjectError,
    },
    error::ClientError,
};

pub const HELP: &str = "\
/join <conversation>             join a conversation room
/leave <conversation>            leave a conversation room
/send <conversation> [--image|--file] <text>
/typing <conversation> [on|off]  announce typing
/read <conversation>             mark the conversation as read
/edit <message> <text>           edit a message
/delete <message>                delete a message
/status <online|away|offline>    change my status
/who [user...]                   list online users or query their status
/notifications                   refresh and list notifications
/ack <notification>              mark a notification as read
/ack-all                         mark every notification as read
/help                            show this help
/quit                            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(ConversationId),
    Leave(ConversationId),
    Send {
        conversation_id: ConversationId,
        content: String,
        kind: Option<MessageKind>,
    },
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },
    Read(ConversationId),
    Edit {
        message_id: MessageId,
        content: String,
    },
    Delete(MessageId),
    Status(PresenceStatus),
    Who(Vec<UserId>),
    Notifications,
    Ack(NotificationId),
    AckAll,
    Help,
    Quit,
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<Command, ClientError> {
    let line = line.trim();
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    match name {
        "/join" => Ok(Command::Join(single_arg(rest, "/join <conversation>")?)),
        "/leave" => Ok(Command::Leave(single_arg(rest, "/leave <conversation>")?)),
        "/send" => parse_send(rest),
        "/typing" => {
            const USAGE: &str = "/typing <conversation> [on|off]";
            let mut args = rest.split_whitespace();
            let conversation_id = args.next().ok_or(ClientError::InvalidCommand(USAGE))?;
            let conversation_id = ConversationId::new(conversation_id)?;
            let is_typing = match args.next() {
                None | Some("on") => true,
                Some("off") => false,
                Some(_) => return Err(ClientError::InvalidCommand(USAGE)),
            };
            Ok(Command::Typing {
                conversation_id,
                is_typing,
            })
        }
        "/read" => Ok(Command::Read(single_arg(rest, "/read <conversation>")?)),
        "/edit" => {
            let (message_id, content) =
                split_target(rest).ok_or(ClientError::InvalidCommand("/edit <message> <text>"))?;
            Ok(Command::Edit {
                message_id: MessageId::new(message_id)?,
                content: content.to_string(),
            })
        }
        "/delete" => Ok(Command::Delete(single_arg(rest, "/delete <message>")?)),
        "/status" => {
            if rest.is_empty() {
                return Err(ClientError::InvalidCommand("/status <online|away|offline>"));
            }
            Ok(Command::Status(rest.parse()?))
        }
        "/who" => {
            let user_ids = rest
                .split_whitespace()
                .map(UserId::new)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Who(user_ids))
        }
        "/notifications" => Ok(Command::Notifications),
        "/ack" => Ok(Command::Ack(single_arg(rest, "/ack <notification>")?)),
        "/ack-all" => Ok(Command::AckAll),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(ClientError::UnknownCommand(other.to_string())),
    }
}

fn parse_send(rest: &str) -> Result<Command, ClientError> {
    const USAGE: &str = "/send <conversation> [--image|--file] <text>";
    let (conversation_id, body) = split_target(rest).ok_or(ClientError::InvalidCommand(USAGE))?;

    let (kind, content) = match body.split_once(char::is_whitespace) {
        Some(("--image", content)) => (Some(MessageKind::Image), content.trim()),
        Some(("--file", content)) => (Some(MessageKind::File), content.trim()),
        _ if body == "--image" || body == "--file" => {
            return Err(ClientError::InvalidCommand(USAGE));
        }
        _ => (None, body),
    };

    Ok(Command::Send {
        conversation_id: ConversationId::new(conversation_id)?,
        content: content.to_string(),
        kind,
    })
}

/// Split `<target> <text...>`, both non-empty.
fn split_target(rest: &str) -> Option<(&str, &str)> {
    let (target, text) = rest.split_once(char::is_whitespace)?;
    let text = text.trim();
    (!text.is_empty()).then_some((target, text))
}

fn single_arg<T>(rest: &str, usage: &'static str) -> Result<T, ClientError>
where
    T: TryFrom<String, Error = ValueObjectError>,
{
    let mut args = rest.split_whitespace();
    match (args.next(), args.next()) {
        (Some(value), None) => Ok(T::try_from(value.to_string())?),
        _ => Err(ClientError::InvalidCommand(usage)),
    }
}
