//! HTTP route handlers for Gatehouse.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod signin;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Sign-in flow
        .route("/signin", get(signin::get_signin).post(signin::submit_signin))
        .route("/signin/challenge", post(signin::regenerate_challenge))
        .route("/signin/lockout", get(signin::lockout_stream))

        // Session
        .route("/session", get(signin::get_session))
        .route("/signout", post(signin::sign_out))

        .layer(TraceLayer::new_for_http())
        // Add shared state
        .with_state(state)
}
