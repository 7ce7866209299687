//! Configuration management for Gatehouse.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::RemoteAuthConfig;
use crate::challenge::ChallengeGenerator;
use crate::signin::{FormRules, SigninSettings};
use portcullis_common::LockoutPolicy;
use portcullis_common::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_CHALLENGE_MAX_OPERAND, DEFAULT_CHALLENGE_MIN_OPERAND,
    DEFAULT_CHALLENGE_TTL_SECS,
    DEFAULT_LISTEN_ADDR, DEFAULT_LOCKOUT_DURATION_SECS, DEFAULT_LOCKOUT_THRESHOLD,
    DEFAULT_MIN_PASSWORD_LENGTH, DEFAULT_REDIS_URL, DEFAULT_STORAGE_NAMESPACE,
    LOCKOUT_TICK_MILLIS, MAX_OUTSTANDING_CHALLENGES,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Prefix for the attempt ledger keys
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,

    /// Lockout policy
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// Challenge configuration
    #[serde(default)]
    pub challenge: ChallengeConfig,

    /// Form validation
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Remote authenticator
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Lockout policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// Failed attempts before lockout
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Lockout duration in seconds
    #[serde(default = "default_lockout_duration")]
    pub duration_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            duration_secs: default_lockout_duration(),
        }
    }
}

/// Challenge operand range (inclusive) and lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeConfig {
    #[serde(default = "default_min_operand")]
    pub min_operand: i64,

    #[serde(default = "default_max_operand")]
    pub max_operand: i64,

    /// Seconds an issued challenge stays answerable
    #[serde(default = "default_challenge_ttl")]
    pub ttl_secs: u64,

    /// Most challenges kept awaiting an answer
    #[serde(default = "default_max_outstanding")]
    pub max_outstanding: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            min_operand: default_min_operand(),
            max_operand: default_max_operand(),
            ttl_secs: default_challenge_ttl(),
            max_outstanding: default_max_outstanding(),
        }
    }
}

/// Form validation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_password_length: default_min_password_length(),
        }
    }
}

/// Remote authenticator configuration
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    /// Auth service base URL
    #[serde(default)]
    pub url: Option<String>,

    /// Public API key
    #[serde(default)]
    pub anon_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_secs: default_auth_timeout(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_storage_namespace() -> String { DEFAULT_STORAGE_NAMESPACE.to_string() }
fn default_threshold() -> u32 { DEFAULT_LOCKOUT_THRESHOLD }
fn default_lockout_duration() -> u64 { DEFAULT_LOCKOUT_DURATION_SECS } // 24 hours
fn default_min_operand() -> i64 { DEFAULT_CHALLENGE_MIN_OPERAND }
fn default_max_operand() -> i64 { DEFAULT_CHALLENGE_MAX_OPERAND }
fn default_challenge_ttl() -> u64 { DEFAULT_CHALLENGE_TTL_SECS }
fn default_max_outstanding() -> usize { MAX_OUTSTANDING_CHALLENGES }
fn default_min_password_length() -> usize { DEFAULT_MIN_PASSWORD_LENGTH }
fn default_auth_timeout() -> u64 { DEFAULT_AUTH_TIMEOUT_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref auth_url) = args.auth_url {
            config.auth.url = Some(auth_url.clone());
        }
        if let Some(ref anon_key) = args.auth_anon_key {
            config.auth.anon_key = Some(anon_key.clone());
        }

        Ok(config)
    }

    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy::new(
            self.lockout.threshold,
            Duration::from_secs(self.lockout.duration_secs),
        )
    }

    pub fn signin_settings(&self) -> SigninSettings {
        SigninSettings {
            policy: self.lockout_policy(),
            rules: FormRules {
                min_password_length: self.validation.min_password_length,
            },
            tick: Duration::from_millis(LOCKOUT_TICK_MILLIS),
            challenge_ttl: Duration::from_secs(self.challenge.ttl_secs),
            max_challenges: self.challenge.max_outstanding,
        }
    }

    pub fn challenge_generator(&self) -> ChallengeGenerator {
        ChallengeGenerator::new(self.challenge.min_operand, self.challenge.max_operand)
    }

    pub fn remote_auth(&self) -> RemoteAuthConfig {
        RemoteAuthConfig {
            url: self.auth.url.clone(),
            anon_key: self.auth.anon_key.clone(),
            timeout: Duration::from_secs(self.auth.timeout_secs),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            storage_namespace: default_storage_namespace(),
            lockout: LockoutConfig::default(),
            challenge: ChallengeConfig::default(),
            validation: ValidationConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
