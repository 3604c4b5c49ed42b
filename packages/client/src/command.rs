//! Parsing of interactive CLI input.
//!
//! Pure functions only, so every command form is easy to test.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `@peer text`
    Send { to: String, text: String },
    /// `/open peer`
    Open(String),
    /// `/close`
    Close,
    /// `/list [term]`
    List(Option<String>),
    /// `/search term`
    Search(String),
    /// `/unread`
    Unread,
    /// `/delete peer message_id`
    Delete { peer: String, message_id: String },
    /// `/notifications [read id | delete id]`
    Notifications(NotificationAction),
    /// `/help`
    Help,
    /// `/quit`
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    List,
    MarkRead(String),
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command '{0}' (try /help)")]
    Unknown(String),
}

pub const HELP: &str = "\
@peer text                send a message
/open peer                show a conversation and mark it read
/close                    leave the open conversation
/list [term]              list conversations, optionally filtered
/search term              look up users on the portal
/unread                   show unread badges and recent activity
/delete peer id           delete one of your messages
/notifications            show the portal notification feed
/notifications read id    mark a notification read
/notifications delete id  delete a notification
/help                     show this help
/quit                     exit";

/// Parse one input line.
///
/// # Arguments
///
/// * `line` - Raw line as typed, already trimmed of the trailing newline
///
/// # Returns
///
/// The command, or a usage error describing the expected form. Text without
/// a leading `@` or `/` is sent to the open conversation by the caller, so it
/// is reported as `Unknown` here.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix('@') {
        let (to, text) = split_first_word(rest);
        if to.is_empty() || text.is_empty() {
            return Err(CommandError::Usage("@peer text"));
        }
        return Ok(Command::Send {
            to: to.to_string(),
            text: text.to_string(),
        });
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Err(CommandError::Unknown(line.to_string()));
    };
    let (name, args) = split_first_word(rest);
    match name {
        "open" => single_arg(args, "/open peer").map(Command::Open),
        "close" => Ok(Command::Close),
        "list" => Ok(Command::List((!args.is_empty()).then(|| args.to_string()))),
        "search" => single_arg(args, "/search term").map(Command::Search),
        "unread" => Ok(Command::Unread),
        "delete" => {
            let (peer, message_id) = split_first_word(args);
            if peer.is_empty() || message_id.is_empty() || message_id.contains(char::is_whitespace) {
                return Err(CommandError::Usage("/delete peer message_id"));
            }
            Ok(Command::Delete {
                peer: peer.to_string(),
                message_id: message_id.to_string(),
            })
        }
        "notifications" => parse_notification_action(args).map(Command::Notifications),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(format!("/{other}"))),
    }
}

fn parse_notification_action(args: &str) -> Result<NotificationAction, CommandError> {
    const USAGE: &str = "/notifications [read id | delete id]";

    let (action, id) = split_first_word(args);
    if action.is_empty() {
        return Ok(NotificationAction::List);
    }
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(CommandError::Usage(USAGE));
    }
    match action {
        "read" => Ok(NotificationAction::MarkRead(id.to_string())),
        "delete" => Ok(NotificationAction::Delete(id.to_string())),
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn split_first_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (input, ""),
    }
}

fn single_arg(args: &str, usage: &'static str) -> Result<String, CommandError> {
    if args.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(args.to_string())
    }
}
