//! # Portcullis Common
//!
//! Shared types, errors, and constants used across Portcullis components.
//!
//! ## Modules
//! - `types` - Core data structures (LedgerSnapshot, LockoutPolicy, SigninView, etc.)
//! - `error` - Sign-in error taxonomy
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::{FieldError, PortcullisError};
pub use types::*;
