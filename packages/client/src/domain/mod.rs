//! Client-side domain types.

pub mod message;
pub mod user;

pub use message::{Message, OutgoingDraft, TEMP_ID_PREFIX};
pub use user::{User, UserType};
