//! Lockout countdown.
//!
//! Derives `{is_blocked, seconds_remaining}` from the ledger deadline and
//! ticks once per second while a lockout is active.

mod timer;

pub use timer::{LockoutSubscription, LockoutTimer};
