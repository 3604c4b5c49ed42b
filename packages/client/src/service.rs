//! Chat service: the context object that wires the connection, unread store,
//! threads and watermarks together and reacts to channel events.

use std::collections::HashMap;
use std::sync::Arc;

use carelink_shared::protocol::{
    ClientEvent, DeleteRequest, DeliveryStatus, DeletedNotice, MessageAck, MessagePayload,
    ReadMarker, ReadReceipt, ServerEvent,
};
use carelink_shared::time::{Clock, SystemClock};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{FileUpload, HttpPortalApi, NotificationFeed, PortalApi};
use crate::badge::{NotificationCenter, TotalBadge};
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, WebSocketConnector};
use crate::directory::{
    ConversationEntry, DirectoryQuery, SearchGeneration, build_directory, merge_candidates,
};
use crate::domain::{Message, OutgoingDraft, User};
use crate::error::ClientError;
use crate::thread::{self, MessageThread};
use crate::unread::UnreadStore;
use crate::watermark::{JsonFileStorage, WatermarkStore};

const ACTIVITY_CAPACITY: usize = 20;

pub struct ChatService {
    current_user_id: String,
    connection: Arc<ConnectionManager>,
    unread: Arc<UnreadStore>,
    activity: NotificationCenter,
    watermarks: Arc<WatermarkStore>,
    api: Arc<dyn PortalApi>,
    clock: Arc<dyn Clock>,
    threads: Mutex<HashMap<String, MessageThread>>,
    roster: Mutex<Vec<User>>,
    /// Conversation currently on screen; its messages never count as unread
    active_peer: Mutex<Option<String>>,
    search_generation: SearchGeneration,
}

impl ChatService {
    pub fn new(
        current_user_id: impl Into<String>,
        connection: Arc<ConnectionManager>,
        unread: Arc<UnreadStore>,
        watermarks: Arc<WatermarkStore>,
        api: Arc<dyn PortalApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let current_user_id = current_user_id.into();
        let activity = NotificationCenter::new(
            current_user_id.clone(),
            Arc::clone(&unread),
            ACTIVITY_CAPACITY,
        );
        Self {
            current_user_id,
            connection,
            unread,
            activity,
            watermarks,
            api,
            clock,
            threads: Mutex::new(HashMap::new()),
            roster: Mutex::new(Vec::new()),
            active_peer: Mutex::new(None),
            search_generation: SearchGeneration::new(),
        }
    }

    /// Production wiring: WebSocket gateway, HTTP portal API, watermarks on disk.
    pub fn from_config(config: &ClientConfig) -> Self {
        let connector = Arc::new(WebSocketConnector::new(config.gateway_url.clone()));
        Self::new(
            config.user_id.clone(),
            Arc::new(ConnectionManager::new(connector, config.reconnect)),
            Arc::new(UnreadStore::new()),
            Arc::new(WatermarkStore::load(JsonFileStorage::new(
                config.watermark_path.clone(),
            ))),
            Arc::new(HttpPortalApi::new(config.api_base_url.clone())),
            Arc::new(SystemClock),
        )
    }

    pub fn current_user_id(&self) -> &str {
        &self.current_user_id
    }

    pub fn unread(&self) -> &Arc<UnreadStore> {
        &self.unread
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Recent inbound activity, consistent with [`ChatService::unread`].
    pub fn activity(&self) -> &NotificationCenter {
        &self.activity
    }

    pub fn total_badge(&self) -> TotalBadge {
        TotalBadge::new(&self.unread)
    }

    /// Connect as the current user and send anything queued while offline.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect(&self.current_user_id).await?;
        self.flush_pending().await;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub async fn send_text(&self, to: &str, content: &str) -> Result<Message, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        self.send(to, OutgoingDraft::text(content)).await
    }

    /// Upload an attachment, then send it as a message.
    ///
    /// Nothing is appended if the upload fails.
    pub async fn send_file(&self, to: &str, upload: FileUpload) -> Result<Message, ClientError> {
        let file_type = upload.mime_type.clone();
        let file_url = self.api.upload_file(upload).await?;
        self.send(to, OutgoingDraft::file(file_url, file_type)).await
    }

    async fn send(&self, to: &str, draft: OutgoingDraft) -> Result<Message, ClientError> {
        let mut threads = self.threads.lock().await;
        let thread = threads
            .entry(to.to_string())
            .or_insert_with(|| MessageThread::new(&self.current_user_id, to));
        let mut message = thread.append(draft, self.clock.now_millis());

        match self
            .connection
            .emit(ClientEvent::SendMessage(message.to_outgoing()))
            .await
        {
            Ok(()) => {}
            Err(ClientError::NotConnected) => {
                warn!("Not connected; message '{}' to '{}' queued", message.id, to);
                thread.set_status(&message.id, Some(DeliveryStatus::Pending));
                message.status = Some(DeliveryStatus::Pending);
            }
            Err(e) => {
                thread.delete(&message.id);
                return Err(e);
            }
        }
        Ok(message)
    }

    async fn flush_pending(&self) {
        let mut threads = self.threads.lock().await;
        for thread in threads.values_mut() {
            for message in thread.pending() {
                if let Err(e) = self
                    .connection
                    .emit(ClientEvent::SendMessage(message.to_outgoing()))
                    .await
                {
                    warn!("Could not flush queued message '{}': {}", message.id, e);
                    return;
                }
                thread.set_status(&message.id, None);
                debug!("Flushed queued message '{}'", message.id);
            }
        }
    }

    /// Show a conversation: its messages become read and its badge clears.
    pub async fn open_conversation(&self, peer_id: &str) -> Vec<Message> {
        *self.active_peer.lock().await = Some(peer_id.to_string());
        self.mark_conversation_read(peer_id, self.clock.now_millis())
            .await;
        self.thread(peer_id).await
    }

    pub async fn close_conversation(&self) {
        *self.active_peer.lock().await = None;
    }

    async fn mark_conversation_read(&self, peer_id: &str, read_at: i64) {
        if let Err(e) = self.watermarks.record_own_read(peer_id, read_at) {
            warn!("Failed to persist read watermark for '{}': {}", peer_id, e);
        }
        self.activity.dismiss(peer_id);

        let marker = ReadMarker {
            peer: peer_id.to_string(),
            read_at,
        };
        if let Err(e) = self.connection.emit(ClientEvent::MarkRead(marker)).await {
            debug!("Read marker for '{}' not sent: {}", peer_id, e);
        }
    }

    /// Request deletion of one of the current user's messages.
    ///
    /// Messages never handed to the gateway are removed locally; others are
    /// removed once the gateway confirms with `message_deleted`.
    pub async fn delete_message(&self, peer_id: &str, message_id: &str) -> Result<(), ClientError> {
        let mut threads = self.threads.lock().await;
        let thread = threads
            .get_mut(peer_id)
            .ok_or_else(|| ClientError::UnknownMessage(message_id.to_string()))?;
        let message = thread
            .get(message_id)
            .ok_or_else(|| ClientError::UnknownMessage(message_id.to_string()))?;

        if message.sender_id != self.current_user_id {
            warn!(
                "Refusing to delete '{}': sent by '{}'",
                message_id, message.sender_id
            );
            return Err(ClientError::NotDeletable {
                message_id: message_id.to_string(),
            });
        }
        if message.status == Some(DeliveryStatus::Pending) {
            thread.delete(message_id);
            return Ok(());
        }
        if message.is_temporary() {
            return Err(ClientError::NotDeletable {
                message_id: message_id.to_string(),
            });
        }

        self.connection
            .emit(ClientEvent::DeleteMessage(DeleteRequest {
                id: message_id.to_string(),
                peer: peer_id.to_string(),
            }))
            .await
    }

    /// Messages with `peer_id`, oldest first.
    pub async fn thread(&self, peer_id: &str) -> Vec<Message> {
        let threads = self.threads.lock().await;
        threads
            .get(peer_id)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn status_of(&self, message: &Message) -> DeliveryStatus {
        let peer_id = message.peer_of(&self.current_user_id);
        thread::status_of(message, self.watermarks.peer_read(peer_id))
    }

    pub async fn set_roster(&self, users: Vec<User>) {
        *self.roster.lock().await = users;
    }

    /// Replace the roster with the portal's user list.
    pub async fn load_roster(&self) -> Result<usize, ClientError> {
        let users = self.api.search_users("").await?;
        let count = users.len();
        self.set_roster(users).await;
        Ok(count)
    }

    pub async fn directory(&self, search: Option<&str>) -> Vec<ConversationEntry> {
        let roster = self.roster.lock().await.clone();
        let messages: Vec<Message> = {
            let threads = self.threads.lock().await;
            threads
                .values()
                .flat_map(|t| t.messages().iter().cloned())
                .collect()
        };
        let query = DirectoryQuery {
            current_user_id: &self.current_user_id,
            search,
            now_millis: self.clock.now_millis(),
        };
        build_directory(&roster, &messages, &self.unread.snapshot(), &query)
    }

    /// Remote user lookup that adds new candidates to the roster.
    ///
    /// Returns `None` when a newer search started before this one answered;
    /// such results are discarded.
    pub async fn search_users(&self, term: &str) -> Result<Option<Vec<User>>, ClientError> {
        let ticket = self.search_generation.begin();
        let results = self.api.search_users(term).await?;
        if !self.search_generation.is_current(ticket) {
            debug!("Discarding stale search results for '{}'", term);
            return Ok(None);
        }

        let candidates: Vec<User> = results
            .into_iter()
            .filter(|u| u.id != self.current_user_id && u.resolve_display_name().is_some())
            .collect();
        let mut roster = self.roster.lock().await;
        let added = merge_candidates(&mut roster, candidates.clone(), &self.current_user_id);
        debug!("Search '{}' added {} candidate(s)", term, added);
        Ok(Some(candidates))
    }

    /// Seed unread counts from the server snapshot.
    pub async fn seed_unread(&self) -> Result<(), ClientError> {
        let counts = self.api.unread_counts(&self.current_user_id).await?;
        self.unread.initialize(counts);
        Ok(())
    }

    /// The portal's persisted notification feed.
    ///
    /// Kept separate from the chat unread counts.
    pub async fn notifications(&self, limit: usize) -> Result<NotificationFeed, ClientError> {
        self.api.notifications(&self.current_user_id, limit).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError> {
        self.api.mark_notification_read(notification_id).await
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<(), ClientError> {
        self.api.delete_notification(notification_id).await
    }

    /// Subscribe to the connection's events and handle them until it closes.
    ///
    /// Call before [`ChatService::connect`] so nothing after registration is missed.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let events = self.connection.subscribe();
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_event_loop(events).await })
    }

    pub async fn run_event_loop(&self, mut events: broadcast::Receiver<ServerEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event loop lagged; {} event(s) skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    pub async fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Registered(ack) => info!("Registered as '{}'", ack.user_id),
            ServerEvent::ReceiveMessage(payload) => self.on_receive(payload).await,
            ServerEvent::MessageAck(ack) => self.on_ack(ack).await,
            ServerEvent::MessageRead(receipt) => self.on_read(receipt).await,
            ServerEvent::MessageDeleted(notice) => self.on_deleted(notice).await,
            ServerEvent::Error(notice) => warn!("Gateway error: {}", notice.message),
        }
    }

    async fn on_receive(&self, payload: MessagePayload) {
        if payload.sender_id.trim().is_empty() {
            warn!("Dropping message '{}' without sender", payload.id);
            return;
        }
        let mut message = Message::from(payload);
        if message.receiver_id.is_empty() {
            message.receiver_id = self.current_user_id.clone();
        }
        if !message.involves(&self.current_user_id) {
            warn!(
                "Dropping message '{}' addressed to '{}'",
                message.id, message.receiver_id
            );
            return;
        }

        let from_self = message.sender_id == self.current_user_id;
        let peer_id = message.peer_of(&self.current_user_id).to_string();
        let timestamp = message.timestamp;
        let inserted = {
            let mut threads = self.threads.lock().await;
            threads
                .entry(peer_id.clone())
                .or_insert_with(|| MessageThread::new(&self.current_user_id, &peer_id))
                .receive(message.clone())
        };
        if !inserted || from_self {
            return;
        }

        let is_active = self.active_peer.lock().await.as_deref() == Some(peer_id.as_str());
        if is_active {
            let read_at = self.clock.now_millis().max(timestamp.saturating_add(1));
            self.mark_conversation_read(&peer_id, read_at).await;
        } else {
            self.unread.increment(&peer_id);
            self.activity.record(&message);
        }
    }

    async fn on_ack(&self, ack: MessageAck) {
        let confirmed = Message::from(ack.message);
        if confirmed.sender_id != self.current_user_id {
            warn!(
                "Ignoring ack for '{}' sent by '{}'",
                confirmed.id, confirmed.sender_id
            );
            return;
        }
        let peer_id = confirmed.receiver_id.clone();
        let mut threads = self.threads.lock().await;
        threads
            .entry(peer_id.clone())
            .or_insert_with(|| MessageThread::new(&self.current_user_id, &peer_id))
            .confirm(&ack.client_id, confirmed);
    }

    async fn on_read(&self, receipt: ReadReceipt) {
        if receipt.from.trim().is_empty() {
            warn!("Dropping read receipt without sender");
            return;
        }
        self.unread.mark_read(&receipt.from);
        if !self.unread.has_unread(&receipt.from) {
            self.activity.dismiss(&receipt.from);
        }

        let Some(read_at) = receipt.read_at else {
            return;
        };
        if let Err(e) = self.watermarks.record_peer_read(&receipt.from, read_at) {
            warn!("Failed to persist read receipt from '{}': {}", receipt.from, e);
        }
        let mut threads = self.threads.lock().await;
        if let Some(thread) = threads.get_mut(&receipt.from) {
            let updated = thread.apply_read_receipt(read_at);
            debug!("{} message(s) to '{}' marked read", updated, receipt.from);
        }
    }

    async fn on_deleted(&self, notice: DeletedNotice) {
        let mut threads = self.threads.lock().await;
        for thread in threads.values_mut() {
            if thread.delete(&notice.id).is_some() {
                debug!("Message '{}' deleted by '{}'", notice.id, notice.by);
                return;
            }
        }
        debug!("Deleted message '{}' was not loaded", notice.id);
    }
}
