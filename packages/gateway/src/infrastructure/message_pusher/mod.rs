//! MessagePusher implementations.
//!
//! - `websocket`: pushes into the per-session channels drained by WebSocket writer tasks

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
