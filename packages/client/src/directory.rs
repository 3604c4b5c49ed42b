//! Conversation Directory.
//!
//! Derives the list of conversation partners from a roster plus the running
//! message history. Roster order is preserved; nothing is re-sorted by recency.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{Message, User};
use crate::unread::UnreadState;

pub const NO_MESSAGES_PREVIEW: &str = "No messages yet";

const MINUTE_MILLIS: i64 = 60 * 1000;
const HOUR_MILLIS: i64 = 60 * MINUTE_MILLIS;
const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    pub partner: User,
    pub display_name: String,
    pub preview_text: String,
    /// `None` when there are no messages with this partner
    pub recency_label: Option<String>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectoryQuery<'a> {
    pub current_user_id: &'a str,
    pub search: Option<&'a str>,
    pub now_millis: i64,
}

/// Relative age label: `now`, `{n}m`, `{n}h` or `{n}d`.
///
/// Timestamps in the future (clock skew) read as `now`.
pub fn recency_label(now_millis: i64, timestamp: i64) -> String {
    let age = now_millis.saturating_sub(timestamp).max(0);
    if age < MINUTE_MILLIS {
        "now".to_string()
    } else if age < HOUR_MILLIS {
        format!("{}m", age / MINUTE_MILLIS)
    } else if age < DAY_MILLIS {
        format!("{}h", age / HOUR_MILLIS)
    } else {
        format!("{}d", age / DAY_MILLIS)
    }
}

/// Preview of the latest message, prefixed with the partner's name while it is
/// theirs and still unread.
pub fn preview_text(partner_id: &str, partner_name: &str, latest: Option<&Message>, unread: u32) -> String {
    match latest {
        None => NO_MESSAGES_PREVIEW.to_string(),
        Some(message) if message.sender_id == partner_id && unread > 0 => {
            format!("{}: {}", partner_name, message.display_text())
        }
        Some(message) => message.display_text(),
    }
}

pub fn build_directory(
    roster: &[User],
    messages: &[Message],
    unread: &UnreadState,
    query: &DirectoryQuery<'_>,
) -> Vec<ConversationEntry> {
    let search = query
        .search
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty());

    // Guard against history that leaked in from another account.
    let own: Vec<&Message> = messages
        .iter()
        .filter(|m| m.involves(query.current_user_id))
        .collect();

    roster
        .iter()
        .filter(|user| user.id != query.current_user_id)
        .filter_map(|user| {
            let name = user.resolve_display_name()?;
            if let Some(term) = &search
                && !name.to_lowercase().contains(term.as_str())
            {
                return None;
            }

            let latest = own
                .iter()
                .filter(|m| m.is_between(query.current_user_id, &user.id))
                .max_by_key(|m| m.timestamp)
                .copied();
            let unread_count = unread.get(&user.id).copied().unwrap_or(0);

            Some(ConversationEntry {
                partner: user.clone(),
                display_name: name.to_string(),
                preview_text: preview_text(&user.id, name, latest, unread_count),
                recency_label: latest.map(|m| recency_label(query.now_millis, m.timestamp)),
                unread_count,
            })
        })
        .collect()
}

/// Append remote lookup results not already in `roster`.
///
/// Invalid users and the current user are skipped. Returns how many were added.
pub fn merge_candidates(roster: &mut Vec<User>, candidates: Vec<User>, current_user_id: &str) -> usize {
    let mut known: HashSet<String> = roster.iter().map(|u| u.id.clone()).collect();
    let before = roster.len();
    for candidate in candidates {
        if candidate.id == current_user_id || candidate.resolve_display_name().is_none() {
            continue;
        }
        if known.insert(candidate.id.clone()) {
            roster.push(candidate);
        }
    }
    roster.len() - before
}

/// Monotonic counter used to drop out-of-date search responses.
#[derive(Debug, Default)]
pub struct SearchGeneration {
    latest: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

impl SearchGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a new lookup, superseding all earlier ones.
    pub fn begin(&self) -> SearchTicket {
        SearchTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}
