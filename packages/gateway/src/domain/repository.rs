//! Repository trait definitions.
//!
//! The use cases depend on this interface; the infrastructure layer provides
//! the implementation.

use async_trait::async_trait;

use super::{entity::LedgerEntry, error::RepositoryError, value_object::MessageId};

/// Memory of relayed messages, used to authorize deletions.
#[async_trait]
pub trait MessageLedger: Send + Sync {
    async fn record(&self, entry: LedgerEntry);

    async fn find(&self, id: &MessageId) -> Option<LedgerEntry>;

    async fn remove(&self, id: &MessageId) -> Result<LedgerEntry, RepositoryError>;

    async fn count(&self) -> usize;
}
