//! Code shared by the Carelink gateway and client.
//!
//! - `logger`: tracing subscriber setup
//! - `time`: clock abstraction and timestamp conversion
//! - `protocol`: realtime channel wire events

pub mod logger;
pub mod protocol;
pub mod time;
