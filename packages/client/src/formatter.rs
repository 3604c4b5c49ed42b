//! Message formatting utilities for the CLI.

use carelink_shared::protocol::DeliveryStatus;
use carelink_shared::time::millis_to_rfc3339;

use crate::api::NotificationFeed;
use crate::badge::{ActivityItem, TotalBadge, badge_label};
use crate::directory::ConversationEntry;
use crate::domain::Message;

const RULE: &str = "------------------------------------------------------------";

/// Message formatter for CLI display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format an inbound message
    ///
    /// # Arguments
    ///
    /// * `message` - The received message
    /// * `unread` - The sender's unread count after this message
    ///
    /// # Returns
    ///
    /// A formatted block with sender, text and time
    pub fn format_incoming(message: &Message, unread: u32) -> String {
        let badge = badge_label(u64::from(unread))
            .map(|label| format!(" [{label}]"))
            .unwrap_or_default();
        format!(
            "\n\n{RULE}\n@{}{}: {}\nsent at {}\n{RULE}\n",
            message.sender_id,
            badge,
            message.display_text(),
            format_time(message.timestamp)
        )
    }

    /// Format one line of a conversation, with delivery status for own messages
    pub fn format_thread_line(message: &Message, current_user_id: &str, status: DeliveryStatus) -> String {
        if message.sender_id == current_user_id {
            format!(
                "{}  me: {} ({}) [{}]",
                format_time(message.timestamp),
                message.display_text(),
                status_label(status),
                message.id
            )
        } else {
            format!(
                "{}  {}: {} [{}]",
                format_time(message.timestamp),
                message.sender_id,
                message.display_text(),
                message.id
            )
        }
    }

    /// Format the conversation directory
    pub fn format_directory(entries: &[ConversationEntry]) -> String {
        let mut output = format!("\n{RULE}\nConversations:\n");
        if entries.is_empty() {
            output.push_str("(No conversations)\n");
        }
        for entry in entries {
            let badge = badge_label(u64::from(entry.unread_count))
                .map(|label| format!(" [{label}]"))
                .unwrap_or_default();
            let recency = entry
                .recency_label
                .as_deref()
                .map(|label| format!(" · {label}"))
                .unwrap_or_default();
            output.push_str(&format!(
                "{} ({}){}{}\n    {}\n",
                entry.display_name, entry.partner.id, badge, recency, entry.preview_text
            ));
        }
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format the unread badges: total first, then per sender
    /// Total badge, per-sender counts and recent activity (newest first)
    pub fn format_unread(badge: &TotalBadge, recent: &[ActivityItem]) -> String {
        let mut output = format!(
            "Unread: {}\n",
            badge.label().unwrap_or_else(|| "none".to_string())
        );
        for (sender, count) in badge.per_sender() {
            output.push_str(&format!("  @{sender}: {count}\n"));
        }
        if !recent.is_empty() {
            output.push_str("Recent:\n");
        }
        for item in recent {
            output.push_str(&format!(
                "  {} @{}: {}\n",
                format_time(item.timestamp),
                item.sender_id,
                item.preview
            ));
        }
        output
    }

    pub fn format_notifications(feed: &NotificationFeed) -> String {
        let mut output = format!("Notifications ({} unread):\n", feed.unread_count);
        if feed.notifications.is_empty() {
            output.push_str("(No notifications)\n");
        }
        for notification in &feed.notifications {
            let marker = if notification.read { " " } else { "*" };
            let title = notification
                .title
                .as_deref()
                .map(|title| format!("{title}: "))
                .unwrap_or_default();
            output.push_str(&format!(
                "{marker} [{}] {title}{}\n",
                notification.id, notification.message
            ));
        }
        output
    }
}

fn status_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "pending",
        DeliveryStatus::Sent => "sent",
        DeliveryStatus::Delivered => "delivered",
        DeliveryStatus::Read => "read",
    }
}

fn format_time(timestamp: i64) -> String {
    millis_to_rfc3339(timestamp).unwrap_or_else(|| timestamp.to_string())
}
