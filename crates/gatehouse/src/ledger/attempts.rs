//! Consecutive failed sign-in attempts with lazy lockout expiry.

use portcullis_common::{LedgerSnapshot, LockoutPolicy, PortcullisError};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::LedgerStore;
use crate::clock::Clock;

/// Attempt ledger service.
///
/// Every read goes to the store so writes from other instances are seen.
/// If the store fails, the ledger keeps counting in memory and never fails
/// open. Storage is retried on every operation; once it answers again the
/// stricter of the stored and in-memory snapshots is written back.
pub struct AttemptLedger<S, C> {
    store: S,
    clock: C,
    /// Last known snapshot, authoritative once degraded
    mirror: Mutex<LedgerSnapshot>,
    degraded: AtomicBool,
}

impl<S: LedgerStore, C: Clock> AttemptLedger<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            mirror: Mutex::new(LedgerSnapshot::EMPTY),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// True once storage failed and the ledger fell back to memory
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Read the ledger, resetting it first if the lockout has expired
    pub async fn read(&self) -> LedgerSnapshot {
        let snapshot = self.load().await;

        if snapshot.is_expired_at(self.clock.now()) {
            tracing::info!(
                failure_count = snapshot.failure_count,
                "Lockout expired, resetting attempt ledger"
            );
            self.persist(LedgerSnapshot::EMPTY).await;
            return LedgerSnapshot::EMPTY;
        }

        snapshot
    }

    /// Record a failed attempt, opening a lockout window at the threshold
    pub async fn record_failure(&self, policy: &LockoutPolicy) -> LedgerSnapshot {
        let mut snapshot = self.read().await;

        snapshot.failure_count = snapshot.failure_count.saturating_add(1);

        if snapshot.failure_count >= policy.threshold && snapshot.locked_until.is_none() {
            let deadline = self.clock.now() + policy.lockout_delta();
            snapshot.locked_until = Some(deadline);
            tracing::warn!(
                failure_count = snapshot.failure_count,
                locked_until = %deadline,
                "Sign-in locked due to failed attempts"
            );
        } else {
            tracing::debug!(
                failure_count = snapshot.failure_count,
                threshold = policy.threshold,
                "Failed sign-in attempt recorded"
            );
        }

        self.persist(snapshot).await;
        snapshot
    }

    /// Record a successful sign-in
    pub async fn record_success(&self) -> LedgerSnapshot {
        self.persist(LedgerSnapshot::EMPTY).await;
        tracing::debug!("Attempt ledger cleared after successful sign-in");
        LedgerSnapshot::EMPTY
    }

    async fn load(&self) -> LedgerSnapshot {
        let stored = match self.store.read().await {
            Ok(stored) => stored,
            Err(e) => {
                self.degrade(&e);
                return *self.mirror.lock().await;
            }
        };

        let mut mirror = self.mirror.lock().await;
        if !self.is_degraded() {
            *mirror = stored;
            return stored;
        }

        // Failures counted while storage was away must not be lost
        let merged = stricter(stored, *mirror);
        *mirror = merged;
        drop(mirror);

        if self.store.write(merged).await.is_ok() {
            self.recover(merged);
        }
        merged
    }

    async fn persist(&self, snapshot: LedgerSnapshot) {
        *self.mirror.lock().await = snapshot;

        match self.store.write(snapshot).await {
            Ok(()) => self.recover(snapshot),
            Err(e) => self.degrade(&e),
        }
    }

    fn recover(&self, snapshot: LedgerSnapshot) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            tracing::info!(
                failure_count = snapshot.failure_count,
                backend = self.store.name(),
                "Ledger storage recovered"
            );
        }
    }

    fn degrade(&self, error: &PortcullisError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                error = %error,
                backend = self.store.name(),
                "Ledger storage unavailable, tracking attempts in memory"
            );
        }
    }
}

/// Higher count and later deadline of two snapshots
fn stricter(a: LedgerSnapshot, b: LedgerSnapshot) -> LedgerSnapshot {
    LedgerSnapshot {
        failure_count: a.failure_count.max(b.failure_count),
        locked_until: a.locked_until.max(b.locked_until),
    }
}
