//! Arithmetic human-verification challenge.
//!
//! Challenges are held in memory only and are single-use: every answer
//! consumes the challenge, and failed sign-ins are handed a new one.

mod book;
mod generator;
mod verifier;

pub use book::{Answer, ChallengeBook};
pub use generator::ChallengeGenerator;
