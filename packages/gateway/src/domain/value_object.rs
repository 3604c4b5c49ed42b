//! Value objects.

use std::fmt;

use super::error::ValueObjectError;

/// Identifier a session registers under; the routing key for relayed events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub const MAX_LEN: usize = 128;

    /// Create a user id, trimming surrounding whitespace.
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValueObjectError::EmptyUserId);
        }
        let len = trimmed.chars().count();
        if len > Self::MAX_LEN {
            return Err(ValueObjectError::UserIdTooLong {
                max: Self::MAX_LEN,
                actual: len,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One WebSocket connection. A user may own many.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned message id. Never carries the client's temporary prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub const PREFIX: &'static str = "msg_";

    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, uuid::Uuid::new_v4().simple()))
    }

    pub fn from_wire(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_is_trimmed() {
        // テスト項目: UserId は前後の空白が除去される
        // given (前提条件):
        let raw = "  alice \n".to_string();

        // when (操作):
        let id = UserId::new(raw).unwrap();

        // then (期待する結果):
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_user_id_rejects_blank() {
        // テスト項目: 空白のみの UserId はエラーになる
        // given (前提条件):
        let raw = "   ".to_string();

        // when (操作):
        let result = UserId::try_from(raw);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyUserId));
    }

    #[test]
    fn test_user_id_rejects_too_long() {
        // テスト項目: 上限を超える長さの UserId はエラーになる
        // given (前提条件):
        let raw = "a".repeat(UserId::MAX_LEN + 1);

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ValueObjectError::UserIdTooLong {
                max: UserId::MAX_LEN,
                actual: UserId::MAX_LEN + 1,
            })
        );
    }

    #[test]
    fn test_generated_message_ids_are_prefixed_and_unique() {
        // テスト項目: 生成されたメッセージ ID は接頭辞付きで一意
        // given (前提条件):

        // when (操作):
        let a = MessageId::generate();
        let b = MessageId::generate();

        // then (期待する結果):
        assert!(a.as_str().starts_with(MessageId::PREFIX));
        assert_ne!(a, b);
    }
}
