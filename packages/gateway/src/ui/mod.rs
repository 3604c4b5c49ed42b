//! UI layer: axum routes, WebSocket session handling and server lifecycle.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
