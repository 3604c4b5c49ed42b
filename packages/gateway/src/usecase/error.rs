//! Use case errors.

use thiserror::Error;

use crate::domain::ValueObjectError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("invalid user id: {0}")]
    InvalidUserId(#[from] ValueObjectError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(ValueObjectError),

    #[error("message has neither content nor attachment")]
    EmptyMessage,

    #[error("failed to encode event: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("message '{0}' is unknown to the gateway")]
    NotFound(String),

    #[error("message '{message_id}' was not sent by '{requester}'")]
    NotOwner {
        message_id: String,
        requester: String,
    },

    #[error("failed to encode event: {0}")]
    Encode(String),
}
