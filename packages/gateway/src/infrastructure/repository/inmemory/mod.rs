//! In-memory repositories.

mod ledger;

pub use ledger::InMemoryMessageLedger;
