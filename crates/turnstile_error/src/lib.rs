//! Error types for the turnstile workspace.
//!
//! This crate provides the error taxonomy shared by the session manager, the rate
//! limiter, the weight budgeter and the retry orchestrator.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Upstream failures enter as [`UpstreamError`] (the raw message reported by the
//! exchange client). Recognised failures are re-expressed as [`ApiError`]; anything
//! unrecognised stays an `UpstreamError` so the original message is preserved.
//!
//! # Examples
//!
//! ```
//! use turnstile_error::{ConfigError, TurnstileResult};
//!
//! fn load() -> TurnstileResult<()> {
//!     Err(ConfigError::new("TURNSTILE_APP_KEY not set"))?
//! }
//!
//! assert!(load().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod config;
mod error;
mod retry;
mod session;
mod upstream;

pub use api::{ApiError, ApiErrorKind, Classification};
pub use config::ConfigError;
pub use error::{TurnstileError, TurnstileErrorKind, TurnstileResult};
pub use retry::{RetryError, RetryErrorKind};
pub use session::{SessionError, SessionErrorKind};
pub use upstream::UpstreamError;
