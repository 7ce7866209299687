//! Attempt ledger.
//!
//! Tracks consecutive failed sign-in attempts and the lockout deadline in
//! shared durable storage.

mod attempts;
mod store;

pub use attempts::AttemptLedger;
pub use store::{LedgerBackend, LedgerStore, MemoryLedgerStore, RedisLedgerStore};

#[cfg(test)]
pub(crate) use store::testing;
