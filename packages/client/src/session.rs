//! Interactive CLI session.

use std::io::Write;
use std::sync::Arc;

use carelink_shared::protocol::ServerEvent;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::badge::TotalBadge;
use crate::command::{Command, CommandError, HELP, NotificationAction, parse_command};
use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::domain::Message;
use crate::error::ClientError;
use crate::formatter::MessageFormatter;
use crate::service::ChatService;

const NOTIFICATION_LIMIT: usize = 20;

/// `user>` or `user [3]>` while anything is unread
fn prompt(user_id: &str, badge: &TotalBadge) -> String {
    match badge.label() {
        Some(label) => format!("{user_id} [{label}]> "),
        None => format!("{user_id}> "),
    }
}

/// Redisplay the prompt after asynchronous output
fn redisplay_prompt(user_id: &str, badge: &TotalBadge) {
    print!("{}", prompt(user_id, badge));
    std::io::stdout().flush().ok();
}

/// Run the interactive client until the user quits or input closes.
pub async fn run_session(config: ClientConfig) -> Result<(), ClientError> {
    let service = Arc::new(ChatService::from_config(&config));
    let user_id = config.user_id.clone();

    let events = service.connection().subscribe();
    let event_task = spawn_event_printer(Arc::clone(&service), events);
    let state_task = spawn_state_printer(&service);

    service.connect().await?;
    if let Err(e) = service.load_roster().await {
        tracing::warn!("Could not load roster: {}", e);
    }
    if let Err(e) = service.seed_unread().await {
        tracing::warn!("Could not load unread counts: {}", e);
    }

    println!(
        "\nYou are '{}'. Type /help for commands. Press Ctrl+C to exit.\n",
        user_id
    );

    let mut input_rx = spawn_readline(user_id.clone(), service.total_badge());
    let mut active: Option<String> = None;

    while let Some(line) = input_rx.recv().await {
        let command = match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(CommandError::Unknown(_)) if !line.starts_with('/') && active.is_some() => {
                Command::Send {
                    to: active.clone().unwrap_or_default(),
                    text: line,
                }
            }
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if let Err(e) = execute(&service, command, &mut active).await {
            println!("Error: {e}");
        }
    }

    event_task.abort();
    state_task.abort();
    service.disconnect().await;
    Ok(())
}

async fn execute(
    service: &ChatService,
    command: Command,
    active: &mut Option<String>,
) -> Result<(), ClientError> {
    let me = service.current_user_id();
    match command {
        Command::Send { to, text } => {
            let message = service.send_text(&to, &text).await?;
            let status = service.status_of(&message);
            println!("{}", MessageFormatter::format_thread_line(&message, me, status));
        }
        Command::Open(peer) => {
            let messages = service.open_conversation(&peer).await;
            println!("--- @{peer} ---");
            for message in &messages {
                let status = service.status_of(message);
                println!("{}", MessageFormatter::format_thread_line(message, me, status));
            }
            *active = Some(peer);
        }
        Command::Close => {
            service.close_conversation().await;
            *active = None;
        }
        Command::List(term) => {
            let entries = service.directory(term.as_deref()).await;
            print!("{}", MessageFormatter::format_directory(&entries));
        }
        Command::Search(term) => match service.search_users(&term).await? {
            Some(users) if users.is_empty() => println!("No users match '{term}'"),
            Some(users) => {
                for user in users {
                    let name = user.resolve_display_name().unwrap_or_default();
                    println!("  {} ({})", name, user.id);
                }
            }
            None => tracing::debug!("Search for '{}' superseded", term),
        },
        Command::Unread => {
            let recent = service.activity().recent();
            print!(
                "{}",
                MessageFormatter::format_unread(&service.total_badge(), &recent)
            );
        }
        Command::Delete { peer, message_id } => {
            service.delete_message(&peer, &message_id).await?;
        }
        Command::Notifications(NotificationAction::List) => {
            let feed = service.notifications(NOTIFICATION_LIMIT).await?;
            print!("{}", MessageFormatter::format_notifications(&feed));
        }
        Command::Notifications(NotificationAction::MarkRead(id)) => {
            service.mark_notification_read(&id).await?;
            println!("Notification {id} marked read");
        }
        Command::Notifications(NotificationAction::Delete(id)) => {
            service.delete_notification(&id).await?;
            println!("Notification {id} deleted");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

/// Handle every inbound event, then print what the user should see.
fn spawn_event_printer(
    service: Arc<ChatService>,
    mut events: broadcast::Receiver<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let me = service.current_user_id().to_string();
        let badge = service.total_badge();
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display lagged; {} event(s) skipped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            service.handle_event(event.clone()).await;

            let output = match &event {
                ServerEvent::ReceiveMessage(payload) if payload.sender_id != me => {
                    let message = Message::from(payload.clone());
                    let unread = service.unread().count(&message.sender_id);
                    Some(MessageFormatter::format_incoming(&message, unread))
                }
                ServerEvent::MessageRead(receipt) => {
                    Some(format!("\n@{} read your messages\n", receipt.from))
                }
                ServerEvent::MessageDeleted(notice) => {
                    Some(format!("\nMessage {} deleted by @{}\n", notice.id, notice.by))
                }
                ServerEvent::Error(notice) => Some(format!("\nGateway: {}\n", notice.message)),
                _ => None,
            };
            if let Some(output) = output {
                print!("{output}");
                redisplay_prompt(&me, &badge);
            }
        }
    })
}

fn spawn_state_printer(service: &ChatService) -> JoinHandle<()> {
    let mut state = service.connection().watch_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Reconnecting { attempt } => {
                    println!("\nConnection lost, reconnecting (attempt {attempt})...");
                }
                ConnectionState::Failed { attempts } => {
                    println!("\nGave up reconnecting after {attempts} attempt(s). Restart to retry.");
                }
                _ => {}
            }
        }
    })
}

/// Read lines on a blocking thread and forward them.
fn spawn_readline(user_id: String, badge: TotalBadge) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt(&user_id, &badge)) {
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
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}
