//! Health check endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::ledger::LedgerStore;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Basic health check (is the server running?)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    /// Ledger backend in use (`redis` or `memory`)
    storage: &'static str,
    /// Ledger fell back to memory after a storage failure
    degraded: bool,
    auth_configured: bool,
    /// Challenges awaiting an answer
    outstanding_challenges: usize,
}

/// Readiness check (are all dependencies healthy?)
///
/// A degraded ledger still enforces lockouts, but is reported as not ready
/// so the orchestrator in front of us can notice.
pub async fn ready_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadyResponse>) {
    let ledger = state.gate.ledger();
    let storage_ok = ledger.store().is_ready().await;
    let degraded = ledger.is_degraded();
    let auth_configured = state.gate.authenticator().is_configured();

    let ready = storage_ok && !degraded && auth_configured;
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "degraded" },
            storage: ledger.store().name(),
            degraded,
            auth_configured,
            outstanding_challenges: state.gate.outstanding_challenges().await,
        }),
    )
}
