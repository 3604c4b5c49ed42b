//! In-process connector for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use carelink_shared::protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;

use super::policy::ReconnectPolicy;
use super::transport::{Connector, TransportLink};
use crate::error::ClientError;

/// Server-side ends of one fake connection.
pub struct FakeServerEnd {
    pub from_client: mpsc::UnboundedReceiver<ClientEvent>,
    pub to_client: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
pub struct FakeConnector {
    opens: AtomicUsize,
    failures_before_success: AtomicUsize,
    closed_opens: AtomicUsize,
    ends: Mutex<Vec<FakeServerEnd>>,
}

impl FakeConnector {
    pub fn failing(times: usize) -> Self {
        let connector = Self::default();
        connector
            .failures_before_success
            .store(times, Ordering::SeqCst);
        connector
    }

    /// The next `times` opens succeed with a link the server already closed.
    /// Those links get no entry in the server ends.
    pub fn close_next_opens(&self, times: usize) {
        self.closed_opens.store(times, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn take_end(&self, index: usize) -> FakeServerEnd {
        let mut ends = self.ends.lock().unwrap();
        let placeholder = FakeServerEnd {
            from_client: mpsc::unbounded_channel().1,
            to_client: mpsc::unbounded_channel().0,
        };
        std::mem::replace(&mut ends[index], placeholder)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self) -> Result<TransportLink, ClientError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_before_success.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_before_success
                .store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::Transport("refused".to_string()));
        }

        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        let closed = self.closed_opens.load(Ordering::SeqCst);
        if closed > 0 {
            self.closed_opens.store(closed - 1, Ordering::SeqCst);
            return Ok(TransportLink { outbound, inbound });
        }
        self.ends.lock().unwrap().push(FakeServerEnd {
            from_client,
            to_client,
        });
        Ok(TransportLink { outbound, inbound })
    }
}

pub fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts,
    }
}
