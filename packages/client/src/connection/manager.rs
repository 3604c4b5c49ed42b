//! Connection lifecycle: idempotent connect, reconnect with backoff,
//! explicit disconnect.

use std::sync::Arc;

use carelink_shared::protocol::{ClientEvent, ServerEvent};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use super::policy::{ConnectionState, ReconnectPolicy};
use super::transport::{Connector, TransportLink};
use crate::error::ClientError;

/// Inbound events buffered per subscriber before it starts lagging.
const EVENT_BUFFER: usize = 256;

/// The live connection of this session, registered under one user id.
#[derive(Debug)]
pub struct ConnectionHandle {
    user_id: String,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    events: broadcast::Sender<ServerEvent>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Queue an event for the gateway. Events queued during a reconnect are
    /// sent once the connection is back.
    pub fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        self.outbound
            .send(event)
            .map_err(|_| ClientError::NotConnected)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// `false` once the connection was closed or the reconnect policy gave up.
    pub fn is_live(&self) -> bool {
        !self.task.is_finished()
    }

    fn close(&self) {
        self.task.abort();
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns at most one live connection per session.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    handle: Mutex<Option<Arc<ConnectionHandle>>>,
    state: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<ServerEvent>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            connector,
            policy,
            handle: Mutex::new(None),
            state: Arc::new(state),
            events,
        }
    }

    /// Open the connection and register `user_id` on it.
    ///
    /// While a live handle exists this returns it unchanged, even when
    /// `user_id` differs from the id it was registered under.
    pub async fn connect(&self, user_id: &str) -> Result<Arc<ConnectionHandle>, ClientError> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref().filter(|h| h.is_live()) {
            if handle.user_id() != user_id {
                tracing::warn!(
                    "Already connected as '{}'; not registering '{}'",
                    handle.user_id(),
                    user_id
                );
            }
            return Ok(Arc::clone(handle));
        }

        self.state.send_replace(ConnectionState::Connecting);
        let link = open_with_retry(self.connector.as_ref(), &self.policy, &self.state).await?;
        register(&link, user_id)?;
        self.state.send_replace(ConnectionState::Connected);
        tracing::info!("Connected and registered as '{}'", user_id);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let pump = Pump {
            user_id: user_id.to_string(),
            connector: Arc::clone(&self.connector),
            policy: self.policy,
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        let task = tokio::spawn(pump.run(link, outbound_rx));

        let handle = Arc::new(ConnectionHandle {
            user_id: user_id.to_string(),
            outbound: outbound_tx,
            events: self.events.clone(),
            task,
        });
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    pub async fn get_handle(&self) -> Option<Arc<ConnectionHandle>> {
        self.handle.lock().await.clone()
    }

    /// Close the connection if there is one. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.close();
            tracing::info!("Disconnected '{}'", handle.user_id());
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// Emit through the current handle.
    pub async fn emit(&self, event: ClientEvent) -> Result<(), ClientError> {
        match self.get_handle().await {
            Some(handle) => handle.emit(event),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Every inbound event, across reconnects and handles.
    ///
    /// Subscribe before `connect` to see the events that follow registration.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}

fn register(link: &TransportLink, user_id: &str) -> Result<(), ClientError> {
    link.outbound
        .send(ClientEvent::Register(user_id.to_string()))
        .map_err(|_| ClientError::Transport("connection closed before register".to_string()))
}

async fn open_with_retry(
    connector: &dyn Connector,
    policy: &ReconnectPolicy,
    state: &watch::Sender<ConnectionState>,
) -> Result<TransportLink, ClientError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match connector.open().await {
            Ok(link) => return Ok(link),
            Err(e) => e,
        };

        if !policy.should_retry(&error, attempt) {
            state.send_replace(ConnectionState::Failed { attempts: attempt });
            tracing::error!("Giving up after {} attempt(s): {}", attempt, error);
            return Err(match error {
                ClientError::Transport(last_error) => ClientError::ConnectionFailed {
                    attempts: attempt,
                    last_error,
                },
                other => other,
            });
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            "Connection attempt {}/{} failed: {}; retrying in {:?}",
            attempt,
            policy.max_attempts,
            error,
            delay
        );
        state.send_replace(ConnectionState::Reconnecting {
            attempt: attempt + 1,
        });
        tokio::time::sleep(delay).await;
    }
}

enum Step {
    Continue,
    Lost(Option<ClientEvent>),
    Stop,
}

/// Background task moving events between a handle and the current link.
struct Pump {
    user_id: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    events: broadcast::Sender<ServerEvent>,
}

impl Pump {
    async fn run(
        self,
        mut link: TransportLink,
        mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    ) {
        loop {
            let step = tokio::select! {
                event = outbound.recv() => match event {
                    Some(event) => match link.outbound.send(event) {
                        Ok(()) => Step::Continue,
                        Err(mpsc::error::SendError(event)) => Step::Lost(Some(event)),
                    },
                    None => Step::Stop,
                },
                inbound = link.inbound.recv() => match inbound {
                    Some(event) => {
                        // No subscribers is fine; the event is simply dropped.
                        let _ = self.events.send(event);
                        Step::Continue
                    }
                    None => Step::Lost(None),
                },
            };

            let unsent = match step {
                Step::Continue => continue,
                Step::Stop => return,
                Step::Lost(unsent) => unsent,
            };

            tracing::warn!("Connection lost; reconnecting as '{}'", self.user_id);
            link = match self.reconnect(unsent).await {
                Some(link) => link,
                None => return,
            };
            self.state.send_replace(ConnectionState::Connected);
            tracing::info!("Reconnected and re-registered as '{}'", self.user_id);
        }
    }

    /// Open a new link, register on it and resend `unsent`.
    ///
    /// A link that closes before both went out is replaced; `unsent` is kept
    /// until a link accepts it. `None` once the policy gives up.
    async fn reconnect(&self, mut unsent: Option<ClientEvent>) -> Option<TransportLink> {
        let mut dropped_links = 0;
        loop {
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt: 1 });
            let link = match open_with_retry(self.connector.as_ref(), &self.policy, &self.state).await {
                Ok(link) => link,
                Err(e) => {
                    tracing::error!("Reconnect failed for '{}': {}", self.user_id, e);
                    return None;
                }
            };

            let error = match register(&link, &self.user_id) {
                Ok(()) => match unsent.take().map(|event| link.outbound.send(event)) {
                    None | Some(Ok(())) => return Some(link),
                    Some(Err(mpsc::error::SendError(event))) => {
                        unsent = Some(event);
                        ClientError::Transport("connection closed before resend".to_string())
                    }
                },
                Err(e) => e,
            };

            dropped_links += 1;
            if !self.policy.should_retry(&error, dropped_links) {
                self.state.send_replace(ConnectionState::Failed {
                    attempts: dropped_links,
                });
                tracing::error!(
                    "Giving up on '{}' after {} dropped link(s): {}",
                    self.user_id,
                    dropped_links,
                    error
                );
                return None;
            }
            let delay = self.policy.delay_for(dropped_links);
            tracing::warn!("{}; reopening in {:?}", error, delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use carelink_shared::protocol::RegisteredAck;

    use super::*;
    use crate::connection::testing::{FakeConnector, FakeServerEnd, fast_policy};

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_and_registers_once() {
        // テスト項目: connect を複数回呼んでも接続と register は 1 回だけ
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));

        // when (操作):
        let first = manager.connect("alice").await.unwrap();
        let second = manager.connect("alice").await.unwrap();
        let third = manager.connect("mallory").await.unwrap();

        // then (期待する結果):
        assert_eq!(connector.opens(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(third.user_id(), "alice");

        let mut end = connector.take_end(0);
        assert_eq!(
            end.from_client.try_recv().unwrap(),
            ClientEvent::Register("alice".to_string())
        );
        assert!(end.from_client.try_recv().is_err());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_then_connect_creates_fresh_handle() {
        // テスト項目: disconnect 後の connect は新しい接続を作り新しい ID で register する
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));
        manager.connect("alice").await.unwrap();

        // when (操作):
        manager.disconnect().await;

        // then (期待する結果):
        assert!(manager.get_handle().await.is_none());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        // when (操作):
        let handle = manager.connect("bob").await.unwrap();

        // then (期待する結果):
        assert_eq!(connector.opens(), 2);
        assert_eq!(handle.user_id(), "bob");
        let mut end = connector.take_end(1);
        assert_eq!(
            end.from_client.try_recv().unwrap(),
            ClientEvent::Register("bob".to_string())
        );
    }

    #[tokio::test]
    async fn test_disconnect_without_handle_is_noop() {
        // テスト項目: 接続がない状態での disconnect は何もしない
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));

        // when (操作):
        manager.disconnect().await;
        manager.disconnect().await;

        // then (期待する結果):
        assert!(manager.get_handle().await.is_none());
        assert_eq!(connector.opens(), 0);
    }

    #[tokio::test]
    async fn test_inbound_events_reach_subscribers() {
        // テスト項目: ゲートウェイからのイベントが購読者に配信される
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));
        let mut events = manager.subscribe();
        manager.connect("alice").await.unwrap();
        let end = connector.take_end(0);

        // when (操作):
        let ack = ServerEvent::Registered(RegisteredAck {
            user_id: "alice".to_string(),
        });
        end.to_client.send(ack.clone()).unwrap();

        // then (期待する結果):
        let received = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, ack);
    }

    #[tokio::test]
    async fn test_initial_connect_retries_with_backoff() {
        // テスト項目: 初回接続の失敗は最大試行回数まで再試行される
        // given (前提条件):
        let connector = Arc::new(FakeConnector::failing(2));
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));

        // when (操作):
        let result = manager.connect("alice").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(connector.opens(), 3);
    }

    #[tokio::test]
    async fn test_connect_fails_after_max_attempts() {
        // テスト項目: 最大試行回数を超えると Failed 状態になりエラーを返す
        // given (前提条件):
        let connector = Arc::new(FakeConnector::failing(10));
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));

        // when (操作):
        let result = manager.connect("alice").await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::ConnectionFailed { attempts: 3, .. })
        ));
        assert_eq!(manager.state(), ConnectionState::Failed { attempts: 3 });
        assert!(manager.get_handle().await.is_none());
    }

    #[tokio::test]
    async fn test_lost_connection_reconnects_and_reregisters() {
        // テスト項目: 接続が切れると再接続し、同じ ID で再 register する
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));
        let handle = manager.connect("alice").await.unwrap();

        // when (操作):
        drop(connector.take_end(0));
        wait_until(|| connector.opens() == 2).await;
        let mut state = manager.watch_state();
        tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(ConnectionState::is_connected),
        )
        .await
        .unwrap()
        .unwrap();
        handle
            .emit(ClientEvent::Register("ignored-by-test".to_string()))
            .unwrap();

        // then (期待する結果):
        let mut end = connector.take_end(1);
        assert_eq!(
            end.from_client.recv().await.unwrap(),
            ClientEvent::Register("alice".to_string())
        );
        assert_eq!(
            end.from_client.recv().await.unwrap(),
            ClientEvent::Register("ignored-by-test".to_string())
        );
        assert!(handle.is_live());
    }

    #[tokio::test]
    async fn test_unsent_event_survives_link_closing_during_reconnect() {
        // テスト項目: 再接続直後のリンクが register 前に閉じても、送れなかったイベントは次のリンクで再送される
        // given (前提条件):
        let connector = Arc::new(FakeConnector::default());
        let manager = ConnectionManager::new(connector.clone(), fast_policy(3));
        let handle = manager.connect("alice").await.unwrap();
        let FakeServerEnd {
            from_client,
            to_client: _to_client,
        } = connector.take_end(0);
        connector.close_next_opens(1);

        // when (操作):
        drop(from_client);
        handle
            .emit(ClientEvent::Register("unsent".to_string()))
            .unwrap();
        wait_until(|| connector.opens() == 3).await;
        let mut state = manager.watch_state();
        tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(ConnectionState::is_connected),
        )
        .await
        .unwrap()
        .unwrap();

        // then (期待する結果):
        let mut end = connector.take_end(1);
        assert_eq!(
            end.from_client.recv().await.unwrap(),
            ClientEvent::Register("alice".to_string())
        );
        assert_eq!(
            end.from_client.recv().await.unwrap(),
            ClientEvent::Register("unsent".to_string())
        );
        assert!(handle.is_live());
    }
}
