//! Application state and shared resources.

use anyhow::Result;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::RemoteAuthenticator;
use crate::clock::SystemClock;
use crate::config::AppConfig;
use crate::ledger::{AttemptLedger, LedgerBackend, MemoryLedgerStore, RedisLedgerStore};
use crate::signin::SigninOrchestrator;

/// Sign-in orchestrator as wired in production
pub type Gate = SigninOrchestrator<RemoteAuthenticator, LedgerBackend, SystemClock>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sign-in flow
    pub gate: Arc<Gate>,

    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state, connecting to Redis unless `memory_only`
    pub async fn new(config: &AppConfig, memory_only: bool) -> Result<Self> {
        let backend = if memory_only {
            tracing::warn!("Attempt ledger kept in memory only (--memory-ledger)");
            LedgerBackend::Memory(MemoryLedgerStore::new())
        } else {
            connect_ledger(config).await
        };

        let authenticator = RemoteAuthenticator::new(config.remote_auth())?;
        let ledger = Arc::new(AttemptLedger::new(backend, SystemClock));
        let gate = SigninOrchestrator::new(
            authenticator,
            ledger,
            config.challenge_generator(),
            config.signin_settings(),
        );

        Ok(Self::from_parts(gate))
    }

    pub fn from_parts(gate: Gate) -> Self {
        Self {
            gate: Arc::new(gate),
            started_at: Instant::now(),
        }
    }
}

/// Connect to Redis; an unreachable Redis degrades to the memory ledger
async fn connect_ledger(config: &AppConfig) -> LedgerBackend {
    let client = match redis::Client::open(config.redis_url.as_str()) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Invalid Redis URL, attempt ledger kept in memory");
            return LedgerBackend::Memory(MemoryLedgerStore::new());
        }
    };

    match tokio::time::timeout(Duration::from_secs(5), ConnectionManager::new(client)).await {
        Ok(Ok(redis)) => {
            tracing::info!(redis_url = %config.redis_url, "✅ Redis connected");
            LedgerBackend::Redis(RedisLedgerStore::new(redis, &config.storage_namespace))
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Redis unavailable, attempt ledger kept in memory");
            LedgerBackend::Memory(MemoryLedgerStore::new())
        }
        Err(_) => {
            tracing::warn!("Redis connection timed out, attempt ledger kept in memory");
            LedgerBackend::Memory(MemoryLedgerStore::new())
        }
    }
}
