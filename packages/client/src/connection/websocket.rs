use async_trait::async_trait;
use carelink_shared::protocol::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Error as WsError, tungstenite::protocol::Message};

use super::transport::{Connector, TransportLink};
use crate::error::ClientError;

/// Connector for the gateway's WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self) -> Result<TransportLink, ClientError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await.map_err(|e| match e {
            WsError::Http(response) => ClientError::Rejected(format!("HTTP {}", response.status())),
            other => ClientError::Transport(other.to_string()),
        })?;
        tracing::debug!("WebSocket connected to {}", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ServerEvent>();

        // writer: ends when the link is dropped or the socket fails
        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let json = match event.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize {:?}: {}", event, e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    tracing::warn!("WebSocket send failed: {}", e);
                    return;
                }
            }
            let _ = write.close().await;
        });

        // reader: dropping inbound_tx tells the owner the connection is gone
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerEvent::from_json(&text) {
                        Ok(event) => {
                            if inbound_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Ignoring malformed event: {} ({})", text.as_str(), e),
                    },
                    Ok(Message::Close(_)) => {
                        tracing::debug!("Gateway closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("WebSocket receive failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(TransportLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
