//! GoTrue-compatible password sign-in client.
//!
//! Speaks the password grant (`POST /auth/v1/token?grant_type=password`)
//! and logout (`POST /auth/v1/logout`) of a Supabase-style auth service.

use anyhow::{Context, Result};
use portcullis_common::constants::messages;
use portcullis_common::{PortcullisError, Session, SessionUser};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

use super::Authenticator;

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Remote authenticator settings
#[derive(Debug, Clone)]
pub struct RemoteAuthConfig {
    /// Base URL of the auth service (e.g. `https://project.supabase.co`)
    pub url: Option<String>,
    /// Public (anon) API key sent as the `apikey` header
    pub anon_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

struct Endpoint {
    base: String,
    anon_key: String,
}

/// Remote authenticator backed by an HTTP auth service
pub struct RemoteAuthenticator {
    client: Client,
    endpoint: Option<Endpoint>,
}

/// Password-grant success body
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.or_else(|| {
            self.expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

impl RemoteAuthenticator {
    pub fn new(config: RemoteAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("Failed to build auth HTTP client")?;

        let endpoint = match (config.url, config.anon_key) {
            (Some(url), Some(anon_key)) if !url.trim().is_empty() && !anon_key.is_empty() => {
                Some(Endpoint {
                    base: url.trim().trim_end_matches('/').to_string(),
                    anon_key,
                })
            }
            _ => {
                warn!("Missing authentication service URL or key. Sign-in will fail until configured.");
                None
            }
        };

        Ok(Self { client, endpoint })
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    fn endpoint(&self) -> Result<&Endpoint, PortcullisError> {
        self.endpoint
            .as_ref()
            .ok_or_else(|| PortcullisError::Transport(messages::NOT_CONFIGURED.to_string()))
    }
}

impl Authenticator for RemoteAuthenticator {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, PortcullisError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/auth/v1/token?grant_type=password", endpoint.base);

        let response = self
            .client
            .post(&url)
            .header("apikey", &endpoint.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Authentication request failed");
                PortcullisError::Transport("Authentication service unreachable".to_string())
            })?;

        let status = response.status();

        if status.is_success() {
            let token: TokenResponse = response.json().await.map_err(|e| {
                warn!(error = %e, "Malformed authentication response");
                PortcullisError::Transport("Malformed authentication response".to_string())
            })?;

            info!(user_id = %token.user.id, "Remote authenticator accepted credentials");
            return Ok(token.into_session());
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let reason = error_reason(&body);

        if status.is_client_error() {
            info!(status = %status, "Remote authenticator rejected credentials");
            Err(PortcullisError::Credential(
                reason.unwrap_or_else(|| messages::INVALID_CREDENTIALS.to_string()),
            ))
        } else {
            warn!(status = %status, reason = ?reason, "Authentication service error");
            Err(PortcullisError::Transport(
                reason.unwrap_or_else(|| format!("Authentication service error ({})", status)),
            ))
        }
    }

    async fn sign_out(&self, session: &Session) -> Result<(), PortcullisError> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/auth/v1/logout", endpoint.base);

        let response = self
            .client
            .post(&url)
            .header("apikey", &endpoint.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| PortcullisError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Sign-out rejected by authentication service");
            return Err(PortcullisError::Transport(format!(
                "Sign-out failed ({})",
                status
            )));
        }

        Ok(())
    }
}

/// GoTrue reports errors under a few different keys depending on version
fn error_reason(body: &Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body[*key].as_str())
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn authenticator(url: Option<String>, anon_key: &str) -> RemoteAuthenticator {
        RemoteAuthenticator::new(RemoteAuthConfig {
            url,
            anon_key: Some(anon_key.to_string()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_password_grant_success() {
        let base = spawn_mock_auth().await;
        let auth = authenticator(Some(format!("{}/", base)), ANON_KEY);

        let session = auth.authenticate(EMAIL, PASSWORD).await.unwrap();
        assert_eq!(session.access_token, "access-123");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-456"));
        assert_eq!(session.user.id, "user-1");
        assert!(session.expires_at.is_some());

        auth.sign_out(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_wrong_password_is_credential_error() {
        let base = spawn_mock_auth().await;
        let auth = authenticator(Some(base), ANON_KEY);

        let err = auth.authenticate(EMAIL, "wrong-password").await.unwrap_err();
        match err {
            PortcullisError::Credential(reason) => assert_eq!(reason, "Invalid login credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_api_key_is_credential_error() {
        let base = spawn_mock_auth().await;
        let auth = authenticator(Some(base), "wrong-key");

        let err = auth.authenticate(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Credential(ref r) if r == "Invalid API key"));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_error() {
        let base = spawn_mock_auth().await;
        let auth = authenticator(Some(format!("{}/down", base)), ANON_KEY);

        let err = auth.authenticate(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Transport(_)));
        assert!(err.counts_as_attempt());
    }

    #[tokio::test]
    async fn test_failed_logout_is_transport_error() {
        let base = spawn_mock_auth().await;
        let auth = authenticator(Some(format!("{}/flaky", base)), ANON_KEY);

        let session = auth.authenticate(EMAIL, PASSWORD).await.unwrap();
        let err = auth.sign_out(&session).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Transport(_)));
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let auth = authenticator(Some("http://127.0.0.1:1".to_string()), ANON_KEY);
        let err = auth.authenticate(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_fails_closed() {
        let auth = authenticator(None, ANON_KEY);
        assert!(!auth.is_configured());

        let err = auth.authenticate(EMAIL, PASSWORD).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Transport(ref r) if r == messages::NOT_CONFIGURED));
    }

    #[test]
    fn test_error_reason_keys() {
        assert_eq!(
            error_reason(&json!({ "msg": "Email not confirmed" })).as_deref(),
            Some("Email not confirmed")
        );
        assert_eq!(error_reason(&json!({ "message": "" })), None);
        assert_eq!(error_reason(&Value::Null), None);
    }
}
