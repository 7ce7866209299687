//! Sign-in flow.
//!
//! Composes the lockout gate, form validation, the challenge and the remote
//! authenticator into one state machine:
//!
//! ```text
//! Idle → Submitting → Success
//!                   → Rejected (→ Idle)
//!                   → Blocked  (→ Idle once the lockout expires)
//! ```

mod orchestrator;
mod validation;

pub use orchestrator::{SigninOrchestrator, SigninSettings};
pub use validation::FormRules;
