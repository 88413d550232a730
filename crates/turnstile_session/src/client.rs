//! The capability set the core needs from an exchange client.

use async_trait::async_trait;
use crate::Credentials;
use serde_json::Value;
use std::path::PathBuf;
use turnstile_error::UpstreamError;

/// How the client should authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthMode {
    /// Interactive login with username and password
    Password,
    /// Non-interactive login with a client certificate
    Certificate {
        /// Certificate file (verified to exist)
        cert_file: PathBuf,
        /// Private key file (verified to exist with mode 0600)
        key_file: PathBuf,
    },
}

/// Upstream operations the session manager and domain operations depend on.
///
/// Errors are reported as raw [`UpstreamError`]s carrying the exchange's own
/// message; classification happens in the retry layer.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Authenticate and open a session.
    async fn login(&self, credentials: &Credentials, auth: &AuthMode)
    -> Result<(), UpstreamError>;

    /// Reset the session's idle timeout.
    async fn keep_alive(&self) -> Result<(), UpstreamError>;

    /// Close the session.
    async fn logout(&self) -> Result<(), UpstreamError>;

    /// Perform a JSON-RPC style query (e.g. `listMarketBook`) on the open session.
    async fn query(&self, method: &str, params: Value) -> Result<Value, UpstreamError>;
}

/// Admission control for logins.
///
/// Every login the [`SessionManager`](crate::SessionManager) attempts waits on
/// its gate first, including forced re-logins after an expired session.
#[async_trait]
pub trait LoginGate: Send + Sync {
    /// Suspend until one more login is allowed.
    async fn admit_login(&self);
}
