//! Outstanding challenges, keyed by an opaque id.
//!
//! Each caller answers the challenge it was issued, so concurrent visitors
//! never replace each other's question. Entries are single-use and expire.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use portcullis_common::constants::MAX_OUTSTANDING_CHALLENGES;
use portcullis_common::{ChallengePrompt, ChallengeState};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::ChallengeGenerator;

/// Outcome of answering an issued challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Correct,
    Wrong,
    /// Never issued, already used, or expired
    Unknown,
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    challenge: ChallengeState,
    expires_at: DateTime<Utc>,
}

/// Issued challenges awaiting an answer
pub struct ChallengeBook {
    generator: ChallengeGenerator,
    ttl: TimeDelta,
    capacity: usize,
    outstanding: Mutex<HashMap<String, Outstanding>>,
}

impl ChallengeBook {
    pub fn new(generator: ChallengeGenerator, ttl: Duration) -> Self {
        Self {
            generator,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            capacity: MAX_OUTSTANDING_CHALLENGES,
            outstanding: Mutex::new(HashMap::new()),
        }
    }

    /// Cap on outstanding entries; the soonest to expire are evicted first
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Issue a fresh challenge
    pub async fn issue(&self, now: DateTime<Utc>) -> ChallengePrompt {
        let id = challenge_id();
        let challenge = self.generator.generate();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut outstanding = self.outstanding.lock().await;
        outstanding.retain(|_, entry| entry.expires_at > now);

        while outstanding.len() >= self.capacity {
            let Some(oldest) = outstanding
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            outstanding.remove(&oldest);
        }

        outstanding.insert(
            id.clone(),
            Outstanding {
                challenge,
                expires_at,
            },
        );
        tracing::debug!(challenge_id = %id, "Issued sign-in challenge");

        ChallengePrompt::new(id, &challenge)
    }

    /// Prompt of a challenge that can still be answered
    pub async fn prompt(&self, id: &str, now: DateTime<Utc>) -> Option<ChallengePrompt> {
        let outstanding = self.outstanding.lock().await;
        outstanding
            .get(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| ChallengePrompt::new(id, &entry.challenge))
    }

    /// The caller's current prompt, or a fresh one if it is gone
    pub async fn prompt_or_issue(&self, id: &str, now: DateTime<Utc>) -> ChallengePrompt {
        match self.prompt(id, now).await {
            Some(prompt) => prompt,
            None => self.issue(now).await,
        }
    }

    /// Answer a challenge. The entry is consumed whatever the outcome.
    pub async fn answer(&self, id: &str, candidate: &str, now: DateTime<Utc>) -> Answer {
        let entry = self.outstanding.lock().await.remove(id);

        match entry {
            Some(entry) if entry.expires_at > now => {
                if self.generator.verify(&entry.challenge, candidate) {
                    Answer::Correct
                } else {
                    Answer::Wrong
                }
            }
            _ => Answer::Unknown,
        }
    }

    /// Forget a challenge without answering it
    pub async fn discard(&self, id: &str) {
        self.outstanding.lock().await.remove(id);
    }

    pub async fn outstanding(&self) -> usize {
        self.outstanding.lock().await.len()
    }
}

/// Random URL-safe challenge id
fn challenge_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
