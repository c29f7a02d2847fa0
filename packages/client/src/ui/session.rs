//! Interactive console session on top of the realtime core.

use std::sync::Arc;

use rustyline::{DefaultEditor, error::ReadlineError};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    domain::{
        Message, MessageDeletion, MessageEdit, Navigator, Notification, PresenceUpdate,
        ReadReceipt, TypingIndicator, UserId,
    },
    error::ClientError,
    infrastructure::dto::websocket::{
        DisconnectPayload, ErrorPayload, NotificationDto, StatusChangedPayload, events,
    },
    realtime::{RealtimeCore, SendOptions, Subscription},
};

use super::{
    command::{Command, HELP, parse_command},
    formatter::EventFormatter,
    prompt::{print_event, prompt_for},
};

/// Navigator ending the console session instead of opening a login view.
pub struct ConsoleNavigator {
    exit: mpsc::UnboundedSender<String>,
}

impl ConsoleNavigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (exit, exit_rx) = mpsc::unbounded_channel();
        (Self { exit }, exit_rx)
    }
}

impl Navigator for ConsoleNavigator {
    fn redirect_to_login(&self, reason: &str) {
        println!("\nSession terminated ({}). Please log in again.", reason);
        self.exit.send(reason.to_string()).ok();
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Run the interactive session until `/quit`, end of input, or a forced logout.
pub async fn run_session(
    core: RealtimeCore,
    identity: UserId,
    mut logout_rx: mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let _subscriptions = subscribe_display(&core, &identity);

    core.start(identity.clone());
    if let Err(e) = core.notifications().fetch_all().await {
        print_event(&EventFormatter::format_error(&e), &identity);
    }

    println!(
        "\nYou are '{}'. Type /help for commands. Press Ctrl+C to exit.\n",
        identity
    );

    let mut input_rx = spawn_readline(prompt_for(&identity));

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match handle_line(&core, &identity, &line).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break,
                    Err(e) => print_event(&EventFormatter::format_error(&e), &identity),
                }
            }
            reason = logout_rx.recv() => {
                tracing::info!("Session ended: {}", reason.unwrap_or_default());
                break;
            }
        }
    }

    core.stop();
    Ok(())
}

async fn handle_line(
    core: &RealtimeCore,
    identity: &UserId,
    line: &str,
) -> Result<Flow, ClientError> {
    let messaging = core.messaging();
    let presence = core.presence();
    let notifications = core.notifications();

    match parse_command(line)? {
        Command::Join(conversation_id) => messaging.join(&conversation_id),
        Command::Leave(conversation_id) => messaging.leave(&conversation_id),
        Command::Send {
            conversation_id,
            content,
            kind,
        } => messaging.send(&conversation_id, content, SendOptions { kind }),
        Command::Typing {
            conversation_id,
            is_typing,
        } => messaging.set_typing(&conversation_id, is_typing),
        Command::Read(conversation_id) => messaging.mark_read(&conversation_id),
        Command::Edit {
            message_id,
            content,
        } => messaging.edit(&message_id, content),
        Command::Delete(message_id) => messaging.delete(&message_id),
        Command::Status(status) => presence.update_my_status(status),
        Command::Who(user_ids) if user_ids.is_empty() => {
            let online = presence.online_users();
            print!("{}", EventFormatter::format_online_users(&online, identity));
        }
        Command::Who(user_ids) => {
            presence.request_status(&user_ids);
            for user_id in &user_ids {
                print!(
                    "{}",
                    EventFormatter::format_presence(
                        user_id,
                        presence.status_of(user_id),
                        presence.last_seen_of(user_id).as_ref()
                    )
                );
            }
        }
        Command::Notifications => {
            notifications.fetch_all().await?;
            print!(
                "{}",
                EventFormatter::format_notifications(&notifications.snapshot())
            );
        }
        Command::Ack(id) => notifications.mark_as_read(&id).await?,
        Command::AckAll => notifications.mark_all_as_read().await?,
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(Flow::Quit),
    }

    Ok(Flow::Continue)
}

/// Print realtime events as they arrive.
fn subscribe_display(core: &RealtimeCore, identity: &UserId) -> Vec<Subscription> {
    let router = core.router();
    let messaging = core.messaging();
    let mut subscriptions = Vec::new();

    let me = identity.clone();
    subscriptions.push(router.on(
        events::CONNECT,
        Arc::new(move |_: &Value| print_event(&EventFormatter::format_connected(&me), &me)),
    ));

    let me = identity.clone();
    subscriptions.push(router.on_typed::<DisconnectPayload>(
        events::DISCONNECT,
        Arc::new(move |payload: DisconnectPayload| {
            print_event(&EventFormatter::format_disconnected(&payload.reason), &me)
        }),
    ));

    let me = identity.clone();
    subscriptions.push(router.on_typed::<ErrorPayload>(
        events::ERROR,
        Arc::new(move |payload: ErrorPayload| {
            print_event(&EventFormatter::format_connection_error(&payload.message), &me)
        }),
    ));

    let me = identity.clone();
    subscriptions.push(messaging.on_message(Arc::new(move |message: Message| {
        print_event(&EventFormatter::format_message(&message, &me), &me)
    })));

    let me = identity.clone();
    subscriptions.push(messaging.on_typing(Arc::new(move |indicator: TypingIndicator| {
        if indicator.user_id != me {
            print_event(&EventFormatter::format_typing(&indicator), &me)
        }
    })));

    let me = identity.clone();
    subscriptions.push(messaging.on_read(Arc::new(move |receipt: ReadReceipt| {
        print_event(&EventFormatter::format_read_receipt(&receipt), &me)
    })));

    let me = identity.clone();
    subscriptions.push(messaging.on_edited(Arc::new(move |edit: MessageEdit| {
        print_event(&EventFormatter::format_edited(&edit), &me)
    })));

    let me = identity.clone();
    subscriptions.push(messaging.on_deleted(Arc::new(move |deletion: MessageDeletion| {
        print_event(&EventFormatter::format_deleted(&deletion), &me)
    })));

    let me = identity.clone();
    subscriptions.push(router.on_decoded::<NotificationDto, Notification>(
        events::NEW_NOTIFICATION,
        Arc::new(move |notification: Notification| {
            print_event(&EventFormatter::format_pushed_notification(&notification), &me)
        }),
    ));

    let me = identity.clone();
    subscriptions.push(router.on_decoded::<StatusChangedPayload, PresenceUpdate>(
        events::PRESENCE_STATUS_CHANGED,
        Arc::new(move |update: PresenceUpdate| {
            let line = EventFormatter::format_presence(
                &update.user_id,
                update.status,
                update.last_seen.as_ref(),
            );
            print_event(&format!("\n{}", line), &me)
        }),
    ));

    subscriptions
}

/// Read lines on a blocking thread, forwarding them until input ends.
fn spawn_readline(prompt: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("{}", ClientError::Readline(e.to_string()));
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("{}", ClientError::Readline(err.to_string()));
                    break;
                }
            }
        }
    });

    input_rx
}
