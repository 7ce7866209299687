//! Sign-in endpoints for the admin login page.
//!
//! Session endpoints take the access token returned by a successful sign-in
//! as `Authorization: Bearer <token>`.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use portcullis_common::constants::messages;
use portcullis_common::{PortcullisError, SessionUser, SigninForm, SigninState, SigninView};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Current form state: challenge, lockout, remaining attempts
pub async fn get_signin(State(state): State<AppState>, headers: HeaderMap) -> Json<SigninView> {
    let token = bearer_token(&headers);
    Json(state.gate.view(token.as_deref()).await)
}

/// Submit the sign-in form
pub async fn submit_signin(
    State(state): State<AppState>,
    Json(form): Json<SigninForm>,
) -> (StatusCode, Json<SigninView>) {
    tracing::debug!(email = %form.email, "Sign-in submitted");

    let view = state.gate.submit(form).await;
    (status_for(&view), Json(view))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegenerateParams {
    /// Challenge being replaced
    #[serde(default)]
    challenge_id: Option<String>,
}

/// Issue a fresh challenge, discarding the caller's previous one
pub async fn regenerate_challenge(
    State(state): State<AppState>,
    Query(params): Query<RegenerateParams>,
) -> Json<SigninView> {
    Json(
        state
            .gate
            .regenerate_challenge(params.challenge_id.as_deref())
            .await,
    )
}

/// Live lockout countdown as Server-Sent Events.
///
/// The countdown task stops as soon as the client disconnects.
pub async fn lockout_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let views = state
        .gate
        .observe_lockout()
        .map(|view| Event::default().event("lockout").json_data(view));

    Sse::new(views).keep_alive(KeepAlive::default())
}

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

fn error_response(e: &PortcullisError) -> ErrorResponse {
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
        Json(ErrorBody {
            error: e.user_message(),
        }),
    )
}

fn unauthenticated() -> ErrorResponse {
    error_response(&PortcullisError::Unauthenticated(
        messages::SIGNIN_REQUIRED.to_string(),
    ))
}

/// User behind the presented access token
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionUser>, ErrorResponse> {
    let token = bearer_token(&headers).ok_or_else(unauthenticated)?;

    state
        .gate
        .session(&token)
        .await
        .map(|session| Json(session.user))
        .ok_or_else(unauthenticated)
}

/// Sign out; the local session is dropped even if remote revocation fails
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ErrorResponse> {
    let token = bearer_token(&headers).ok_or_else(unauthenticated)?;

    state
        .gate
        .sign_out(&token)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| error_response(&e))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn status_for(view: &SigninView) -> StatusCode {
    match view.state {
        SigninState::Success => StatusCode::OK,
        SigninState::Blocked => StatusCode::TOO_MANY_REQUESTS,
        SigninState::Submitting => StatusCode::CONFLICT,
        SigninState::Rejected => StatusCode::UNAUTHORIZED,
        SigninState::Idle if !view.field_errors.is_empty() => StatusCode::BAD_REQUEST,
        SigninState::Idle => StatusCode::OK,
    }
}
