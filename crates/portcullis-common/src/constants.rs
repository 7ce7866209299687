//! Shared constants for Portcullis components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default Gatehouse HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Default namespace for the attempt ledger keys
pub const DEFAULT_STORAGE_NAMESPACE: &str = "portcullis:signin";

/// Failed attempts before lockout (current policy)
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 2;

/// Lockout duration in seconds (24 hours)
pub const DEFAULT_LOCKOUT_DURATION_SECS: u64 = 86_400;

/// Smallest challenge operand
pub const DEFAULT_CHALLENGE_MIN_OPERAND: i64 = 1;

/// Largest challenge operand (inclusive)
pub const DEFAULT_CHALLENGE_MAX_OPERAND: i64 = 20;

/// Largest operand magnitude a configured range is clamped to
pub const CHALLENGE_OPERAND_LIMIT: i64 = 1_000_000_000;

/// How long an issued challenge can be answered
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 600;

/// Outstanding challenges kept before the oldest are evicted
pub const MAX_OUTSTANDING_CHALLENGES: usize = 10_000;

/// Minimum accepted password length
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Remote authenticator request timeout
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Lockout countdown tick interval
pub const LOCKOUT_TICK_MILLIS: u64 = 1_000;

/// Ledger storage key suffixes, joined to the namespace with `:`
pub mod storage_keys {
    /// Consecutive failed attempts: {namespace}:failure_count
    pub const FAILURE_COUNT: &str = "failure_count";

    /// Lockout deadline in epoch milliseconds: {namespace}:locked_until
    pub const LOCKED_UNTIL: &str = "locked_until";
}

/// User-facing messages
pub mod messages {
    pub const SIGNED_IN: &str = "Successfully signed in!";
    pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
    pub const WRONG_CHALLENGE: &str = "Incorrect answer to the verification question";
    pub const SUBMISSION_IN_FLIGHT: &str = "A sign-in attempt is already in progress";
    pub const NOT_CONFIGURED: &str = "Authentication service not configured";
    pub const INVALID_EMAIL: &str = "Invalid email address";
    pub const ANSWER_REQUIRED: &str = "Please answer the verification question";
    pub const CHALLENGE_EXPIRED: &str = "The verification question expired, please answer the new one";
    pub const SIGNIN_REQUIRED: &str = "Not signed in";
}
