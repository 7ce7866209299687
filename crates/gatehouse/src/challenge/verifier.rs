//! Challenge answer verification.

use portcullis_common::ChallengeState;

/// True iff `candidate` parses as an integer equal to the expected answer.
/// Non-numeric input is simply wrong, never an error.
pub fn verify(challenge: &ChallengeState, candidate: &str) -> bool {
    candidate
        .trim()
        .parse::<i64>()
        .is_ok_and(|answer| answer == challenge.expected)
}
