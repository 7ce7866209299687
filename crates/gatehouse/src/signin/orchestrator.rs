//! Sign-in orchestration.

use chrono::{DateTime, Utc};
use portcullis_common::constants::{
    DEFAULT_CHALLENGE_TTL_SECS, LOCKOUT_TICK_MILLIS, MAX_OUTSTANDING_CHALLENGES, messages,
};
use portcullis_common::{
    ChallengePrompt, FieldError, LedgerSnapshot, LockoutPolicy, LockoutView, PortcullisError,
    Session, SigninForm, SigninState, SigninView,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::FormRules;
use crate::auth::Authenticator;
use crate::challenge::{Answer, ChallengeBook, ChallengeGenerator};
use crate::clock::Clock;
use crate::ledger::{AttemptLedger, LedgerStore};
use crate::lockout::{LockoutSubscription, LockoutTimer};

/// Tunables for the sign-in flow
#[derive(Debug, Clone, Copy)]
pub struct SigninSettings {
    pub policy: LockoutPolicy,
    pub rules: FormRules,
    /// Countdown tick interval
    pub tick: Duration,
    /// How long an issued challenge stays answerable
    pub challenge_ttl: Duration,
    /// Cap on challenges awaiting an answer
    pub max_challenges: usize,
}

impl Default for SigninSettings {
    fn default() -> Self {
        Self {
            policy: LockoutPolicy::default(),
            rules: FormRules::default(),
            tick: Duration::from_millis(LOCKOUT_TICK_MILLIS),
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
            max_challenges: MAX_OUTSTANDING_CHALLENGES,
        }
    }
}

/// Clears the in-flight flag when the submission finishes
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sign-in state machine.
///
/// The attempt ledger is shared by every caller. Challenges are issued per
/// caller and sessions are only reachable through their access token.
/// Only one submission runs at a time, so ledger mutations from this
/// orchestrator have a single writer.
pub struct SigninOrchestrator<A, S, C> {
    authenticator: A,
    ledger: Arc<AttemptLedger<S, C>>,
    timer: LockoutTimer<S, C>,
    challenges: ChallengeBook,
    settings: SigninSettings,
    submitting: AtomicBool,
    /// Live sessions keyed by access token
    sessions: Mutex<HashMap<String, Session>>,
}

impl<A, S, C> SigninOrchestrator<A, S, C>
where
    A: Authenticator,
    S: LedgerStore,
    C: Clock,
{
    pub fn new(
        authenticator: A,
        ledger: Arc<AttemptLedger<S, C>>,
        generator: ChallengeGenerator,
        settings: SigninSettings,
    ) -> Self {
        let timer = LockoutTimer::new(ledger.clone(), settings.tick);

        Self {
            authenticator,
            ledger,
            timer,
            challenges: ChallengeBook::new(generator, settings.challenge_ttl)
                .with_capacity(settings.max_challenges),
            settings,
            submitting: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn authenticator(&self) -> &A {
        &self.authenticator
    }

    pub fn ledger(&self) -> &AttemptLedger<S, C> {
        &self.ledger
    }

    /// Challenges issued and not yet answered or expired
    pub async fn outstanding_challenges(&self) -> usize {
        self.challenges.outstanding().await
    }

    /// Current view with a freshly issued challenge.
    ///
    /// `Success` is only reported to a caller presenting a live access token;
    /// the view never carries the session itself.
    pub async fn view(&self, access_token: Option<&str>) -> SigninView {
        let snapshot = self.ledger.read().await;
        let signed_in = match access_token {
            Some(token) => self.session(token).await.is_some(),
            None => false,
        };

        let state = if self.submitting.load(Ordering::SeqCst) {
            SigninState::Submitting
        } else if signed_in {
            SigninState::Success
        } else if self.lockout_of(&snapshot).is_blocked {
            SigninState::Blocked
        } else {
            SigninState::Idle
        };

        let challenge = self.challenges.issue(self.now()).await;
        self.compose(state, &snapshot, challenge)
    }

    /// Handle a submitted form. Every failure is mapped into the returned view.
    pub async fn submit(&self, form: SigninForm) -> SigninView {
        let Some(_in_flight) = self.begin_submission() else {
            debug!("Sign-in submission refused, another attempt is in flight");
            let snapshot = self.ledger.read().await;
            let challenge = self.current_challenge(&form).await;
            return SigninView {
                message: Some(messages::SUBMISSION_IN_FLIGHT.to_string()),
                ..self.compose(SigninState::Submitting, &snapshot, challenge)
            };
        };

        // 1. Lockout gate: no remote call, no ledger mutation
        let snapshot = self.ledger.read().await;
        let lockout = self.lockout_of(&snapshot);
        if lockout.is_blocked {
            info!(
                seconds_remaining = lockout.seconds_remaining,
                "Sign-in refused, lockout active"
            );
            let challenge = self.current_challenge(&form).await;
            return SigninView {
                message: Some(blocked_message(None, &lockout)),
                ..self.compose(SigninState::Blocked, &snapshot, challenge)
            };
        }

        // 2. Structural validation, not counted
        if let Err(field_errors) = self.settings.rules.validate(&form) {
            debug!(fields = field_errors.len(), "Sign-in form failed validation");
            let challenge = self.current_challenge(&form).await;
            return SigninView {
                message: Some(PortcullisError::Validation(field_errors.clone()).user_message()),
                field_errors,
                ..self.compose(SigninState::Idle, &snapshot, challenge)
            };
        }

        // 3. Challenge, counted but never reaches the authenticator
        match self
            .challenges
            .answer(&form.challenge_id, &form.challenge_answer, self.now())
            .await
        {
            Answer::Correct => {}
            Answer::Wrong => {
                return self
                    .reject(PortcullisError::Challenge(messages::WRONG_CHALLENGE.to_string()))
                    .await;
            }
            Answer::Unknown => {
                debug!("Sign-in answered an unknown or expired challenge");
                let challenge = self.challenges.issue(self.now()).await;
                return SigninView {
                    message: Some(messages::CHALLENGE_EXPIRED.to_string()),
                    field_errors: vec![FieldError::new(
                        "challenge_answer",
                        messages::CHALLENGE_EXPIRED,
                    )],
                    ..self.compose(SigninState::Idle, &snapshot, challenge)
                };
            }
        }

        // 4. Remote authenticator
        match self
            .authenticator
            .authenticate(form.email.trim(), &form.password)
            .await
        {
            Ok(session) => {
                let snapshot = self.ledger.record_success().await;
                info!(user_id = %session.user.id, "Admin signed in");

                self.keep_session(session.clone()).await;
                let challenge = self.challenges.issue(self.now()).await;
                SigninView {
                    message: Some(messages::SIGNED_IN.to_string()),
                    session: Some(session),
                    ..self.compose(SigninState::Success, &snapshot, challenge)
                }
            }
            Err(e) => self.reject(e).await,
        }
    }

    /// Drop the caller's previous challenge, if any, and issue a new one
    pub async fn regenerate_challenge(&self, previous: Option<&str>) -> SigninView {
        if let Some(previous) = previous {
            self.challenges.discard(previous).await;
        }
        self.view(None).await
    }

    /// Live lockout countdown
    pub fn observe_lockout(&self) -> LockoutSubscription {
        self.timer.observe()
    }

    /// Live session for an access token
    pub async fn session(&self, access_token: &str) -> Option<Session> {
        let now = self.now().timestamp();
        let mut sessions = self.sessions.lock().await;

        let session = sessions.get(access_token).cloned()?;
        if is_live(&session, now) {
            return Some(session);
        }

        sessions.remove(access_token);
        debug!(user_id = %session.user.id, "Session expired");
        None
    }

    /// Revoke the session behind an access token.
    ///
    /// The local session is dropped even if the remote revocation fails.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), PortcullisError> {
        let now = self.now().timestamp();
        let session = self
            .sessions
            .lock()
            .await
            .remove(access_token)
            .filter(|session| is_live(session, now))
            .ok_or_else(|| PortcullisError::Unauthenticated(messages::SIGNIN_REQUIRED.to_string()))?;

        info!(user_id = %session.user.id, "Admin signed out");
        self.authenticator.sign_out(&session).await.inspect_err(|e| {
            warn!(error = %e, "Remote sign-out failed, session dropped locally");
        })
    }

    fn begin_submission(&self) -> Option<InFlight<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(&self.submitting))
    }

    /// The challenge the form was answering, while it is still live
    async fn current_challenge(&self, form: &SigninForm) -> ChallengePrompt {
        self.challenges
            .prompt_or_issue(&form.challenge_id, self.now())
            .await
    }

    async fn keep_session(&self, session: Session) {
        let now = self.now().timestamp();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, kept| is_live(kept, now));
        sessions.insert(session.access_token.clone(), session);
    }

    /// Count a failed attempt and issue a fresh challenge
    async fn reject(&self, error: PortcullisError) -> SigninView {
        debug_assert!(error.counts_as_attempt());

        let snapshot = self.ledger.record_failure(&self.settings.policy).await;
        let challenge = self.challenges.issue(self.now()).await;

        let lockout = self.lockout_of(&snapshot);
        let remaining = snapshot.remaining_attempts(&self.settings.policy);
        let reason = error.user_message();

        if lockout.is_blocked {
            warn!(
                error = %error,
                failure_count = snapshot.failure_count,
                seconds_remaining = lockout.seconds_remaining,
                "Sign-in attempt failed, lockout started"
            );
            SigninView {
                message: Some(blocked_message(Some(&reason), &lockout)),
                ..self.compose(SigninState::Blocked, &snapshot, challenge)
            }
        } else {
            info!(
                error = %error,
                failure_count = snapshot.failure_count,
                remaining_attempts = remaining,
                "Sign-in attempt failed"
            );
            SigninView {
                message: Some(format!(
                    "{}. {} attempt(s) remaining before lockout",
                    reason, remaining
                )),
                ..self.compose(SigninState::Rejected, &snapshot, challenge)
            }
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.ledger.clock().now()
    }

    fn lockout_of(&self, snapshot: &LedgerSnapshot) -> LockoutView {
        LockoutView::at(snapshot.locked_until, self.now())
    }

    fn compose(
        &self,
        state: SigninState,
        snapshot: &LedgerSnapshot,
        challenge: ChallengePrompt,
    ) -> SigninView {
        let lockout = self.lockout_of(snapshot);
        SigninView {
            state,
            is_blocked: lockout.is_blocked,
            seconds_remaining: lockout.seconds_remaining,
            remaining_attempts: snapshot.remaining_attempts(&self.settings.policy),
            challenge,
            field_errors: Vec::new(),
            message: None,
            session: None,
        }
    }
}

fn is_live(session: &Session, now: i64) -> bool {
    session.expires_at.is_none_or(|expires_at| expires_at > now)
}

fn blocked_message(reason: Option<&str>, lockout: &LockoutView) -> String {
    let wait = format!(
        "Too many failed attempts. Try again in {}",
        lockout.remaining_label()
    );
    match reason {
        Some(reason) => format!("{}. {}", reason, wait),
        None => wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{EMAIL, FakeAuthenticator, PASSWORD};
    use crate::clock::TestClock;
    use crate::ledger::MemoryLedgerStore;
    use crate::ledger::testing::FlakyStore;
    use chrono::TimeDelta;
    use tokio::sync::Notify;

    type Gate<S> = SigninOrchestrator<Arc<FakeAuthenticator>, S, TestClock>;

    fn gate_with<S: LedgerStore>(
        store: S,
        policy: LockoutPolicy,
        auth: Arc<FakeAuthenticator>,
    ) -> Gate<S> {
        let ledger = Arc::new(AttemptLedger::new(store, TestClock::new()));
        let settings = SigninSettings {
            policy,
            ..SigninSettings::default()
        };
        SigninOrchestrator::new(auth, ledger, ChallengeGenerator::default(), settings)
    }

    fn gate(policy: LockoutPolicy) -> (Gate<MemoryLedgerStore>, Arc<FakeAuthenticator>) {
        let auth = Arc::new(FakeAuthenticator::new());
        (gate_with(MemoryLedgerStore::new(), policy, auth.clone()), auth)
    }

    fn form(password: &str, challenge_id: &str, answer: String) -> SigninForm {
        SigninForm {
            email: EMAIL.to_string(),
            password: password.to_string(),
            challenge_id: challenge_id.to_string(),
            challenge_answer: answer,
        }
    }

    /// Fetch a challenge and answer it, correctly or not
    async fn answered<S: LedgerStore>(gate: &Gate<S>, password: &str, correct: bool) -> SigninForm {
        let challenge = gate.view(None).await.challenge;
        let sum = challenge.operand_a + challenge.operand_b;
        let answer = if correct { sum } else { sum + 1 };
        form(password, &challenge.id, answer.to_string())
    }

    async fn attempt<S: LedgerStore>(gate: &Gate<S>, password: &str, correct: bool) -> SigninView {
        let form = answered(gate, password, correct).await;
        gate.submit(form).await
    }

    async fn sign_in<S: LedgerStore>(gate: &Gate<S>) -> Session {
        let view = attempt(gate, PASSWORD, true).await;
        assert_eq!(view.state, SigninState::Success);
        view.session.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let session = sign_in(&gate).await;
        assert_eq!(session.user.id, "user-1");
        assert_eq!(auth.calls(), 1);
        assert_eq!(gate.ledger().read().await, LedgerSnapshot::EMPTY);

        let view = gate.view(Some(&session.access_token)).await;
        assert_eq!(view.state, SigninState::Success);
        assert!(view.session.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_callers_never_see_the_session() {
        let (gate, _auth) = gate(LockoutPolicy::STRICT);
        let session = sign_in(&gate).await;

        let anonymous = gate.view(None).await;
        assert_eq!(anonymous.state, SigninState::Idle);
        assert!(anonymous.session.is_none());

        let empty = gate.submit(SigninForm::default()).await;
        assert_eq!(empty.state, SigninState::Idle);
        assert!(empty.session.is_none());
        assert!(!empty.field_errors.is_empty());

        let err = gate.sign_out("fake-token-guess").await.unwrap_err();
        assert!(matches!(err, PortcullisError::Unauthenticated(_)));
        assert!(gate.session(&session.access_token).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_challenge_skips_authenticator() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let view = attempt(&gate, PASSWORD, false).await;

        assert_eq!(view.state, SigninState::Rejected);
        assert_eq!(view.remaining_attempts, 1);
        assert_eq!(auth.calls(), 0);
        assert_eq!(gate.ledger().read().await.failure_count, 1);
        assert_eq!(gate.view(None).await.state, SigninState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_numeric_answer_counts() {
        let (gate, auth) = gate(LockoutPolicy::STANDARD);

        let challenge = gate.view(None).await.challenge;
        let view = gate
            .submit(form(PASSWORD, &challenge.id, "twelve".to_string()))
            .await;
        assert_eq!(view.state, SigninState::Rejected);
        assert_ne!(view.challenge.id, challenge.id);
        assert_eq!(auth.calls(), 0);
        assert_eq!(gate.ledger().read().await.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_challenge_not_counted() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let view = gate
            .submit(form(PASSWORD, "never-issued", "12".to_string()))
            .await;

        assert_eq!(view.state, SigninState::Idle);
        assert_eq!(view.field_errors[0].field, "challenge_answer");
        assert_ne!(view.challenge.id, "never-issued");
        assert_eq!(auth.calls(), 0);
        assert_eq!(gate.ledger().read().await, LedgerSnapshot::EMPTY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_challenge_cannot_be_replayed() {
        let (gate, auth) = gate(LockoutPolicy::STANDARD);

        let wrong = answered(&gate, "wrong-password", true).await;
        let replay = SigninForm {
            password: PASSWORD.to_string(),
            ..wrong.clone()
        };

        assert_eq!(gate.submit(wrong).await.state, SigninState::Rejected);
        let view = gate.submit(replay).await;
        assert_eq!(view.state, SigninState::Idle);
        assert_eq!(view.message.as_deref(), Some(messages::CHALLENGE_EXPIRED));
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_challenge_not_counted() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let stale = answered(&gate, PASSWORD, true).await;
        gate.ledger().clock().advance(TimeDelta::minutes(10));

        let view = gate.submit(stale).await;
        assert_eq!(view.state, SigninState::Idle);
        assert_eq!(auth.calls(), 0);
        assert_eq!(gate.ledger().read().await, LedgerSnapshot::EMPTY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callers_keep_their_own_challenge() {
        let (gate, _auth) = gate(LockoutPolicy::STRICT);

        let mine = answered(&gate, PASSWORD, true).await;

        // Another visitor loads the form and asks for a new question
        let theirs = gate.view(None).await.challenge;
        gate.regenerate_challenge(Some(theirs.id.as_str())).await;
        gate.regenerate_challenge(None).await;

        let view = gate.submit(mine).await;
        assert_eq!(view.state, SigninState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_discards_previous() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let old = answered(&gate, PASSWORD, true).await;
        let view = gate.regenerate_challenge(Some(old.challenge_id.as_str())).await;
        assert_ne!(view.challenge.id, old.challenge_id);

        let view = gate.submit(old).await;
        assert_eq!(view.state, SigninState::Idle);
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_policy_locks_for_a_day() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);

        let first = attempt(&gate, "wrong-password", true).await;
        assert_eq!(first.state, SigninState::Rejected);
        assert_eq!(first.remaining_attempts, 1);

        let now = gate.ledger().clock().now();
        let second = attempt(&gate, "wrong-password", true).await;
        assert_eq!(second.state, SigninState::Blocked);
        assert!(second.is_blocked);
        assert_eq!(second.remaining_attempts, 0);

        let snapshot = gate.ledger().read().await;
        assert_eq!(snapshot.locked_until, Some(now + TimeDelta::hours(24)));

        // Even valid credentials are refused at the gate
        let third = attempt(&gate, PASSWORD, true).await;
        assert_eq!(third.state, SigninState::Blocked);
        assert_eq!(third.seconds_remaining, 86_400);
        assert_eq!(auth.calls(), 2);
        assert_eq!(gate.ledger().read().await, snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_standard_policy_mixed_failures() {
        let (gate, auth) = gate(LockoutPolicy::STANDARD);

        for attempt_no in 1..=4 {
            let view = attempt(&gate, PASSWORD, false).await;
            assert_eq!(view.state, SigninState::Rejected);
            assert_eq!(view.remaining_attempts, 5 - attempt_no);
        }
        assert_eq!(auth.calls(), 0);

        let view = attempt(&gate, "wrong-password", true).await;

        assert_eq!(auth.calls(), 1);
        assert_eq!(view.state, SigninState::Blocked);
        assert_eq!(view.seconds_remaining, 900);
        assert_eq!(gate.ledger().read().await.failure_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failures_not_counted() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);
        let challenge = gate.view(None).await.challenge;

        for _ in 0..3 {
            let view = gate
                .submit(SigninForm {
                    email: "nope".into(),
                    password: "123".into(),
                    challenge_id: challenge.id.clone(),
                    challenge_answer: String::new(),
                })
                .await;
            assert_eq!(view.state, SigninState::Idle);
            assert_eq!(view.field_errors.len(), 3);
            // The question stays the same until it is answered
            assert_eq!(view.challenge, challenge);
        }

        assert_eq!(auth.calls(), 0);
        assert_eq!(gate.ledger().read().await, LedgerSnapshot::EMPTY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_counts() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);
        auth.set_transport_down(true);

        let view = attempt(&gate, PASSWORD, true).await;

        assert_eq!(view.state, SigninState::Rejected);
        assert_eq!(gate.ledger().read().await.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_prior_failures() {
        let (gate, _auth) = gate(LockoutPolicy::STANDARD);

        for _ in 0..3 {
            attempt(&gate, PASSWORD, false).await;
        }
        assert_eq!(gate.ledger().read().await.failure_count, 3);

        let view = attempt(&gate, PASSWORD, true).await;
        assert_eq!(view.state, SigninState::Success);
        assert_eq!(view.remaining_attempts, 5);
        assert_eq!(gate.ledger().read().await, LedgerSnapshot::EMPTY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_returns_to_idle_after_expiry() {
        let (gate, _auth) = gate(LockoutPolicy::STRICT);

        for _ in 0..2 {
            attempt(&gate, PASSWORD, false).await;
        }
        assert_eq!(gate.view(None).await.state, SigninState::Blocked);

        gate.ledger().clock().advance(TimeDelta::hours(24));
        let view = gate.view(None).await;
        assert_eq!(view.state, SigninState::Idle);
        assert_eq!(view.remaining_attempts, 2);

        let view = attempt(&gate, PASSWORD, true).await;
        assert_eq!(view.state, SigninState::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmission_refused_while_in_flight() {
        let release = Arc::new(Notify::new());
        let auth = Arc::new(FakeAuthenticator::gated(release.clone()));
        let gate = Arc::new(gate_with(
            MemoryLedgerStore::new(),
            LockoutPolicy::STRICT,
            auth.clone(),
        ));

        let pending = answered(&gate, "wrong-password", true).await;
        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.submit(pending).await }
        });

        while auth.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gate.view(None).await.state, SigninState::Submitting);

        let second_form = answered(&gate, PASSWORD, true).await;
        let second_id = second_form.challenge_id.clone();
        let second = gate.submit(second_form).await;
        assert_eq!(second.state, SigninState::Submitting);
        assert_eq!(second.message.as_deref(), Some(messages::SUBMISSION_IN_FLIGHT));
        assert_eq!(second.challenge.id, second_id);
        assert_eq!(auth.calls(), 1);

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.state, SigninState::Rejected);
        assert_eq!(gate.ledger().read().await.failure_count, 1);
        assert_eq!(gate.view(None).await.state, SigninState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_holds_without_storage() {
        let auth = Arc::new(FakeAuthenticator::new());
        let gate = gate_with(FlakyStore::offline(), LockoutPolicy::STRICT, auth.clone());

        for _ in 0..2 {
            attempt(&gate, "wrong-password", true).await;
        }
        assert!(gate.ledger().is_degraded());

        let view = attempt(&gate, PASSWORD, true).await;
        assert_eq!(view.state, SigninState::Blocked);
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_returns_to_idle() {
        let (gate, _auth) = gate(LockoutPolicy::STRICT);
        let session = sign_in(&gate).await;
        let token = session.access_token.as_str();
        assert!(gate.session(token).await.is_some());

        gate.sign_out(token).await.unwrap();
        assert!(gate.session(token).await.is_none());
        assert_eq!(gate.view(Some(token)).await.state, SigninState::Idle);

        // Nothing left to revoke
        let err = gate.sign_out(token).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_revocation_still_drops_session() {
        let (gate, auth) = gate(LockoutPolicy::STRICT);
        let session = sign_in(&gate).await;
        auth.set_revocation_down(true);

        let err = gate.sign_out(&session.access_token).await.unwrap_err();
        assert!(matches!(err, PortcullisError::Transport(_)));
        assert_eq!(err.status_code(), 502);
        assert!(gate.session(&session.access_token).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_expire() {
        let (gate, _auth) = gate(LockoutPolicy::STRICT);
        let first = sign_in(&gate).await;
        let second = sign_in(&gate).await;
        assert_ne!(first.access_token, second.access_token);
        assert!(gate.session(&first.access_token).await.is_some());

        gate.ledger().clock().advance(TimeDelta::hours(2));
        assert!(gate.session(&first.access_token).await.is_none());
        assert!(gate.sign_out(&second.access_token).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_lockout_after_lock() {
        let (gate, _auth) = gate(LockoutPolicy::new(1, Duration::from_secs(3)));

        attempt(&gate, PASSWORD, false).await;

        let mut sub = gate.observe_lockout();
        let first = sub.next_view().await.unwrap();
        assert_eq!(first.seconds_remaining, 3);
        assert!(first.is_blocked);
    }
}
