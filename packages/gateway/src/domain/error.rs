//! Domain error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("user id is too long ({actual} > {max} chars)")]
    UserIdTooLong { max: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("session '{0}' is not registered")]
    SessionNotFound(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("message '{0}' not found")]
    MessageNotFound(String),
}
