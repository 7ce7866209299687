//! Challenge generation.

use portcullis_common::ChallengeState;
use portcullis_common::constants::{
    CHALLENGE_OPERAND_LIMIT, DEFAULT_CHALLENGE_MAX_OPERAND, DEFAULT_CHALLENGE_MIN_OPERAND,
};
use rand::Rng;
use std::ops::RangeInclusive;

use super::verifier;

/// Challenge generator service
#[derive(Debug, Clone)]
pub struct ChallengeGenerator {
    /// Inclusive operand range
    operands: RangeInclusive<i64>,
}

impl ChallengeGenerator {
    /// Create a generator; a reversed range is swapped and both bounds are
    /// clamped to `±CHALLENGE_OPERAND_LIMIT` so the sum always fits
    pub fn new(min_operand: i64, max_operand: i64) -> Self {
        let clamp = |v: i64| v.clamp(-CHALLENGE_OPERAND_LIMIT, CHALLENGE_OPERAND_LIMIT);
        let (min_operand, max_operand) = (clamp(min_operand), clamp(max_operand));
        let (low, high) = if min_operand <= max_operand {
            (min_operand, max_operand)
        } else {
            (max_operand, min_operand)
        };
        Self {
            operands: low..=high,
        }
    }

    /// Draw two independent operands uniformly from the range
    pub fn generate(&self) -> ChallengeState {
        let mut rng = rand::rng();
        let challenge = ChallengeState::new(
            rng.random_range(self.operands.clone()),
            rng.random_range(self.operands.clone()),
        );

        tracing::debug!(
            operand_a = challenge.operand_a,
            operand_b = challenge.operand_b,
            "Generated sign-in challenge"
        );

        challenge
    }

    pub fn verify(&self, challenge: &ChallengeState, candidate: &str) -> bool {
        verifier::verify(challenge, candidate)
    }
}

impl Default for ChallengeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_MIN_OPERAND, DEFAULT_CHALLENGE_MAX_OPERAND)
    }
}
