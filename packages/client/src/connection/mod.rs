//! Connection Manager: one realtime connection per client session.

mod manager;
mod policy;
#[cfg(test)]
pub(crate) mod testing;
mod transport;
mod websocket;

pub use manager::{ConnectionHandle, ConnectionManager};
pub use policy::{ConnectionState, ReconnectPolicy};
pub use transport::{Connector, TransportLink};
pub use websocket::WebSocketConnector;
