//! Session lifecycle for a session-authenticated exchange API.
//!
//! One [`SessionManager`] owns the single authenticated session of the process.
//! Every login, keep-alive and logout runs under one exclusive lock so concurrent
//! callers always agree on whether the session is active.
//!
//! The network side is abstracted behind [`ExchangeClient`]; a real HTTP client is
//! one implementation, [`testing::MockExchangeClient`] (feature `testing`) another.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod credentials;
mod manager;
#[cfg(feature = "testing")]
pub mod testing;

pub use client::{AuthMode, ExchangeClient, LoginGate};
pub use credentials::{
    CertificatePair, Credentials, REQUIRED_KEY_MODE, check_key_permissions, resolve_auth_mode,
};
pub use manager::{SessionManager, SessionState};
