//! Durable storage backends for the attempt ledger.
//!
//! The ledger lives under two keys, `{namespace}:failure_count` and
//! `{namespace}:locked_until`, so every Gatehouse instance sharing the Redis
//! sees the same counter. Concurrent writers are last-writer-wins.

use chrono::{DateTime, Utc};
use portcullis_common::constants::storage_keys;
use portcullis_common::{LedgerSnapshot, PortcullisError};
use redis::aio::ConnectionManager;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Keyed read/write access to the persisted ledger
pub trait LedgerStore: Send + Sync + 'static {
    /// Load the current snapshot; missing keys read as empty
    fn read(&self) -> impl Future<Output = Result<LedgerSnapshot, PortcullisError>> + Send;

    /// Replace the stored snapshot
    fn write(
        &self,
        snapshot: LedgerSnapshot,
    ) -> impl Future<Output = Result<(), PortcullisError>> + Send;

    /// Backend name for logs and readiness output
    fn name(&self) -> &'static str;
}

impl<S: LedgerStore> LedgerStore for Arc<S> {
    fn read(&self) -> impl Future<Output = Result<LedgerSnapshot, PortcullisError>> + Send {
        self.as_ref().read()
    }

    fn write(
        &self,
        snapshot: LedgerSnapshot,
    ) -> impl Future<Output = Result<(), PortcullisError>> + Send {
        self.as_ref().write(snapshot)
    }

    fn name(&self) -> &'static str {
        self.as_ref().name()
    }
}

/// Process-local store, used when no durable backend is available and in tests
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    snapshot: Mutex<LedgerSnapshot>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    async fn read(&self) -> Result<LedgerSnapshot, PortcullisError> {
        Ok(*self.snapshot.lock().await)
    }

    async fn write(&self, snapshot: LedgerSnapshot) -> Result<(), PortcullisError> {
        *self.snapshot.lock().await = snapshot;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Redis-backed store shared by every instance using the same namespace
#[derive(Clone)]
pub struct RedisLedgerStore {
    /// Redis connection manager (auto-reconnecting)
    redis: ConnectionManager,
    failure_key: String,
    deadline_key: String,
}

impl RedisLedgerStore {
    pub fn new(redis: ConnectionManager, namespace: &str) -> Self {
        Self {
            redis,
            failure_key: format!("{}:{}", namespace, storage_keys::FAILURE_COUNT),
            deadline_key: format!("{}:{}", namespace, storage_keys::LOCKED_UNTIL),
        }
    }

    /// Check Redis connectivity
    pub async fn ping(&self) -> bool {
        let mut conn = self.redis.clone();
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }
}

impl LedgerStore for RedisLedgerStore {
    async fn read(&self) -> Result<LedgerSnapshot, PortcullisError> {
        let mut conn = self.redis.clone();
        let (count, deadline): (Option<String>, Option<String>) = redis::pipe()
            .get(&self.failure_key)
            .get(&self.deadline_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| PortcullisError::StorageUnavailable(e.to_string()))?;

        Ok(LedgerSnapshot {
            failure_count: parse_failure_count(count.as_deref()),
            locked_until: parse_deadline(deadline.as_deref()),
        })
    }

    async fn write(&self, snapshot: LedgerSnapshot) -> Result<(), PortcullisError> {
        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(&self.failure_key, snapshot.failure_count)
            .ignore();

        match snapshot.locked_until {
            Some(deadline) => pipe
                .set(&self.deadline_key, deadline.timestamp_millis())
                .ignore(),
            None => pipe.del(&self.deadline_key).ignore(),
        };

        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| PortcullisError::StorageUnavailable(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Backend selected at startup
pub enum LedgerBackend {
    Redis(RedisLedgerStore),
    Memory(MemoryLedgerStore),
}

impl LedgerBackend {
    /// Durable backend reachable (memory is always "ready" but not durable)
    pub async fn is_ready(&self) -> bool {
        match self {
            Self::Redis(store) => store.ping().await,
            Self::Memory(_) => true,
        }
    }
}

impl LedgerStore for LedgerBackend {
    async fn read(&self) -> Result<LedgerSnapshot, PortcullisError> {
        match self {
            Self::Redis(store) => store.read().await,
            Self::Memory(store) => store.read().await,
        }
    }

    async fn write(&self, snapshot: LedgerSnapshot) -> Result<(), PortcullisError> {
        match self {
            Self::Redis(store) => store.write(snapshot).await,
            Self::Memory(store) => store.write(snapshot).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Redis(store) => store.name(),
            Self::Memory(store) => store.name(),
        }
    }
}

/// Unparseable counters read as zero
fn parse_failure_count(raw: Option<&str>) -> u32 {
    match raw.map(|value| value.trim().parse::<u32>()) {
        Some(Ok(count)) => count,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring malformed stored failure count");
            0
        }
        None => 0,
    }
}

/// Deadline is stored as epoch milliseconds
fn parse_deadline(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    let parsed = raw
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis);

    if parsed.is_none() {
        tracing::warn!(value = %raw, "Ignoring malformed stored lockout deadline");
    }
    parsed
}
