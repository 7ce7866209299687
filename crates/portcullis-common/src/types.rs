//! Core types shared across Portcullis components.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::FieldError;

/// Lockout policy: how many consecutive failures open a lockout window,
/// and how long that window lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that trigger a lockout
    pub threshold: u32,
    /// Length of the lockout window
    pub lockout_duration: Duration,
}

impl LockoutPolicy {
    /// 5 attempts / 15 minutes
    pub const STANDARD: LockoutPolicy = LockoutPolicy {
        threshold: 5,
        lockout_duration: Duration::from_secs(15 * 60),
    };

    /// 2 attempts / 24 hours
    pub const STRICT: LockoutPolicy = LockoutPolicy {
        threshold: 2,
        lockout_duration: Duration::from_secs(24 * 60 * 60),
    };

    /// Create a policy; a zero threshold is clamped to 1
    pub fn new(threshold: u32, lockout_duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            lockout_duration,
        }
    }

    /// Lockout window as a chrono delta (saturating)
    pub fn lockout_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.lockout_duration).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::STRICT
    }
}

/// Persisted state of the attempt ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Consecutive failed sign-in attempts
    pub failure_count: u32,

    /// Lockout deadline, set once the threshold is reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
}

impl LedgerSnapshot {
    pub const EMPTY: LedgerSnapshot = LedgerSnapshot {
        failure_count: 0,
        locked_until: None,
    };

    /// True once the deadline has been reached or passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|deadline| now >= deadline)
    }

    /// Attempts left before the policy locks sign-in
    pub fn remaining_attempts(&self, policy: &LockoutPolicy) -> u32 {
        policy.threshold.saturating_sub(self.failure_count)
    }
}

/// Arithmetic human-verification challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChallengeState {
    pub operand_a: i64,
    pub operand_b: i64,

    /// Expected answer (server-side only, not sent to client)
    #[serde(skip_serializing)]
    pub expected: i64,
}

impl ChallengeState {
    pub fn new(operand_a: i64, operand_b: i64) -> Self {
        Self {
            operand_a,
            operand_b,
            expected: operand_a.saturating_add(operand_b),
        }
    }

    /// Question shown to the user
    pub fn prompt(&self) -> String {
        format!("What is {} + {}?", self.operand_a, self.operand_b)
    }
}

/// Live lockout status derived from the ledger deadline and the wall clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutView {
    pub is_blocked: bool,
    pub seconds_remaining: u64,
}

impl LockoutView {
    pub const UNBLOCKED: LockoutView = LockoutView {
        is_blocked: false,
        seconds_remaining: 0,
    };

    /// Compute the view for a deadline at `now`.
    ///
    /// Remaining time is rounded up to whole seconds, so the view only reads
    /// `{false, 0}` once `now >= locked_until`.
    pub fn at(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match locked_until {
            Some(deadline) if deadline > now => {
                let remaining = deadline - now;
                let whole = remaining.num_seconds();
                let seconds = if remaining > TimeDelta::seconds(whole) {
                    whole + 1
                } else {
                    whole
                };
                Self {
                    is_blocked: true,
                    seconds_remaining: seconds.max(0) as u64,
                }
            }
            _ => Self::UNBLOCKED,
        }
    }

    /// Remaining time as `HH:MM:SS` or `MM:SS`
    pub fn remaining_label(&self) -> String {
        let hours = self.seconds_remaining / 3600;
        let minutes = (self.seconds_remaining % 3600) / 60;
        let seconds = self.seconds_remaining % 60;
        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }
}

/// Sign-in state machine states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigninState {
    /// Ready for a submission
    #[default]
    Idle,
    /// Waiting on the remote authenticator
    Submitting,
    /// Signed in
    Success,
    /// Last attempt failed, still under the threshold
    Rejected,
    /// Lockout window active
    Blocked,
}

/// Authenticated user as reported by the remote authenticator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Session issued by the remote authenticator
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiry (Unix epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    pub user: SessionUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Sign-in form submitted by the presentation layer
#[derive(Clone, Default, Deserialize)]
pub struct SigninForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Id of the challenge being answered
    #[serde(default)]
    pub challenge_id: String,
    #[serde(default)]
    pub challenge_answer: String,
}

impl fmt::Debug for SigninForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigninForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("challenge_id", &self.challenge_id)
            .field("challenge_answer", &self.challenge_answer)
            .finish()
    }
}

/// Challenge as shown to the client (no answer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengePrompt {
    /// Opaque id the answer must be submitted with
    pub id: String,
    pub operand_a: i64,
    pub operand_b: i64,
    pub question: String,
}

impl ChallengePrompt {
    pub fn new(id: impl Into<String>, challenge: &ChallengeState) -> Self {
        Self {
            id: id.into(),
            operand_a: challenge.operand_a,
            operand_b: challenge.operand_b,
            question: challenge.prompt(),
        }
    }
}

/// Everything the presentation layer needs to render the sign-in form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninView {
    pub state: SigninState,
    pub is_blocked: bool,
    pub seconds_remaining: u64,
    pub remaining_attempts: u32,
    pub challenge: ChallengePrompt,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Only present in the response to the submission that signed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_view_rounds_up_partial_seconds() {
        let now = at(0);
        let deadline = now + TimeDelta::milliseconds(1_500);
        let view = LockoutView::at(Some(deadline), now);
        assert!(view.is_blocked);
        assert_eq!(view.seconds_remaining, 2);
    }

    #[test]
    fn test_view_unblocked_at_deadline() {
        let deadline = at(900);
        assert_eq!(LockoutView::at(Some(deadline), at(900)), LockoutView::UNBLOCKED);
        assert_eq!(LockoutView::at(Some(deadline), at(901)), LockoutView::UNBLOCKED);
        assert_eq!(LockoutView::at(None, at(0)), LockoutView::UNBLOCKED);
        assert_eq!(LockoutView::at(Some(deadline), at(0)).seconds_remaining, 900);
    }

    #[test]
    fn test_remaining_label() {
        let view = LockoutView {
            is_blocked: true,
            seconds_remaining: 86_399,
        };
        assert_eq!(view.remaining_label(), "23:59:59");
        let view = LockoutView {
            is_blocked: true,
            seconds_remaining: 65,
        };
        assert_eq!(view.remaining_label(), "01:05");
    }

    #[test]
    fn test_challenge_answer_not_serialized() {
        let challenge = ChallengeState::new(7, 8);
        assert_eq!(challenge.expected, 15);
        let json = serde_json::to_value(challenge).unwrap();
        assert!(json.get("expected").is_none());
        assert_eq!(challenge.prompt(), "What is 7 + 8?");

        let prompt = ChallengePrompt::new("c1", &challenge);
        assert_eq!(prompt.id, "c1");
        assert_eq!(prompt.question, "What is 7 + 8?");
    }

    #[test]
    fn test_challenge_sum_saturates() {
        let challenge = ChallengeState::new(i64::MAX, 1);
        assert_eq!(challenge.expected, i64::MAX);
        assert_eq!(SigninState::default(), SigninState::Idle);
    }

    #[test]
    fn test_remaining_attempts() {
        let snapshot = LedgerSnapshot {
            failure_count: 4,
            locked_until: None,
        };
        assert_eq!(snapshot.remaining_attempts(&LockoutPolicy::STANDARD), 1);
        assert_eq!(snapshot.remaining_attempts(&LockoutPolicy::STRICT), 0);
        assert_eq!(LockoutPolicy::new(0, Duration::from_secs(1)).threshold, 1);
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session {
            access_token: "secret-token".into(),
            refresh_token: Some("refresh".into()),
            token_type: "bearer".into(),
            expires_at: None,
            user: SessionUser {
                id: "u1".into(),
                email: None,
            },
        };
        let debug = format!("{:?}", session);
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("refresh"));
    }
}
