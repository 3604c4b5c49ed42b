//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use carelink_shared::time::SystemClock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::GatewayConfig,
    infrastructure::{message_pusher::WebSocketMessagePusher, repository::InMemoryMessageLedger},
    usecase::{
        DeleteMessageUseCase, DisconnectSessionUseCase, GetPresenceUseCase,
        RegisterSessionUseCase, RelayMessageUseCase, RelayReadUseCase,
    },
};

use super::{
    handler::{
        http::{get_presence, health_check},
        websocket::websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Realtime channel gateway server
///
/// # Example
///
/// ```ignore
/// let config = GatewayConfig::default();
/// Server::from_config(&config).run(&config).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Wire the in-memory pusher and ledger into every use case.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let ledger = Arc::new(InMemoryMessageLedger::new(config.ledger_capacity));
        let clock = Arc::new(SystemClock);

        Self::new(AppState {
            register_session_usecase: Arc::new(RegisterSessionUseCase::new(
                message_pusher.clone(),
            )),
            disconnect_session_usecase: Arc::new(DisconnectSessionUseCase::new(
                message_pusher.clone(),
            )),
            relay_message_usecase: Arc::new(RelayMessageUseCase::new(
                message_pusher.clone(),
                ledger.clone(),
                clock,
            )),
            relay_read_usecase: Arc::new(RelayReadUseCase::new(message_pusher.clone())),
            delete_message_usecase: Arc::new(DeleteMessageUseCase::new(
                message_pusher.clone(),
                ledger,
            )),
            get_presence_usecase: Arc::new(GetPresenceUseCase::new(message_pusher)),
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket endpoint
            .route("/ws", get(websocket_handler))
            // HTTP endpoints
            .route("/api/health", get(health_check))
            .route("/api/sessions/{user_id}", get(get_presence))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to the configured address and serve until Ctrl+C.
    pub async fn run(self, config: &GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = config.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Gateway listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Gateway shutdown complete");
        Ok(())
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
