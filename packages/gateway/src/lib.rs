//! Realtime channel gateway.
//!
//! Sessions connect over WebSocket, announce themselves with a `register`
//! event, and from then on receive every event addressed to their user id.
//! One user may hold several sessions at once (browser tabs); events are fanned
//! out to all of them.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
