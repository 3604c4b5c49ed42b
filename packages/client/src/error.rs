//! Error types for the messaging client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway refused the handshake; retrying will not help
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// Transport-level failure (refused, reset, closed)
    #[error("Connection error: {0}")]
    Transport(String),

    /// Reconnect policy exhausted
    #[error("Failed to connect after {attempts} attempt(s): {last_error}")]
    ConnectionFailed { attempts: u32, last_error: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    /// Someone else's message, or one still awaiting confirmation
    #[error("Message '{message_id}' cannot be deleted")]
    NotDeletable { message_id: String },

    #[error("Message has neither content nor attachment")]
    EmptyMessage,

    #[error("Unknown message '{0}'")]
    UnknownMessage(String),
}

impl ClientError {
    /// Whether a reconnect attempt could fix this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_is_retryable() {
        // テスト項目: Transport エラーは再接続対象と判定される
        // given (前提条件):
        let error = ClientError::Transport("connection reset".to_string());

        // when (操作):
        let result = error.is_retryable();

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_rejected_error_is_not_retryable() {
        // テスト項目: ハンドシェイク拒否は再接続対象外と判定される
        // given (前提条件):
        let error = ClientError::Rejected("HTTP 403".to_string());

        // when (操作):
        let result = error.is_retryable();

        // then (期待する結果):
        assert!(!result);
    }
}
