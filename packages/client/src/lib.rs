//! Messaging core for the Carelink portal.
//!
//! - `connection`: one realtime connection per session, with reconnect policy
//! - `unread`: per-sender unread accounting shared by every badge
//! - `thread`: per-conversation message log and delivery status
//! - `watermark`: persisted read watermarks
//! - `directory`: conversation list derivation
//! - `badge`: notification badge consumers
//! - `service`: the context object wiring all of the above to channel events

pub mod api;
pub mod badge;
pub mod command;
pub mod config;
pub mod connection;
pub mod directory;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod service;
pub mod session;
pub mod thread;
pub mod unread;
pub mod watermark;

pub use error::ClientError;
pub use service::ChatService;
