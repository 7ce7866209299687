//! Error taxonomy for the sign-in flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Form field name (`email`, `password`, `challenge_answer`)
    pub field: String,
    /// Human-readable message
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors across Portcullis components
#[derive(Debug, Error)]
pub enum PortcullisError {
    /// Malformed sign-in input
    #[error("Invalid input: {} field(s) rejected", .0.len())]
    Validation(Vec<FieldError>),

    /// Wrong or unparseable challenge answer
    #[error("Challenge failed: {0}")]
    Challenge(String),

    /// Remote authenticator rejected the credentials
    #[error("Credentials rejected: {0}")]
    Credential(String),

    /// Remote authenticator could not be reached or answered garbage
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing or unknown session token
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Durable ledger storage failed
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortcullisError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Challenge(_) => 401,
            Self::Credential(_) => 401,
            Self::Unauthenticated(_) => 401,
            Self::Transport(_) => 502,
            Self::StorageUnavailable(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this failure counts against the attempt ledger
    pub fn counts_as_attempt(&self) -> bool {
        matches!(
            self,
            Self::Challenge(_) | Self::Credential(_) | Self::Transport(_)
        )
    }

    /// Message suitable for showing to the person signing in
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::Challenge(msg)
            | Self::Credential(msg)
            | Self::Transport(msg)
            | Self::Unauthenticated(msg) => msg.clone(),
            Self::StorageUnavailable(_) | Self::Config(_) | Self::Internal(_) => {
                "Something went wrong, please try again".to_string()
            }
        }
    }
}
