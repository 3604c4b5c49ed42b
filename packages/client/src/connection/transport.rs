use async_trait::async_trait;
use carelink_shared::protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;

use crate::error::ClientError;

/// An open realtime connection as a pair of channels.
///
/// The connection is gone once `inbound` yields `None` or a send on
/// `outbound` fails. Dropping the link closes it.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<ClientEvent>,
    pub inbound: mpsc::UnboundedReceiver<ServerEvent>,
}

/// Opens realtime connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolves once the transport reports the connection as established.
    async fn open(&self) -> Result<TransportLink, ClientError>;
}
