//! Remote credential verification.

mod remote;

pub use remote::{RemoteAuthenticator, RemoteAuthConfig};

use portcullis_common::{PortcullisError, Session};
use std::future::Future;

/// Remote credential service consulted by the sign-in flow.
///
/// Any `Err` is counted as a failed attempt regardless of cause.
pub trait Authenticator: Send + Sync + 'static {
    /// Exchange email and password for a session
    fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Session, PortcullisError>> + Send;

    /// Revoke a session
    fn sign_out(&self, session: &Session) -> impl Future<Output = Result<(), PortcullisError>> + Send;
}
