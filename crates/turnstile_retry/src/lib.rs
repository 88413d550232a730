//! Error classification and automatic recovery.
//!
//! Upstream failures arrive as raw messages. [`classify`] maps them onto a closed
//! set of kinds, and two strategies recover from the kinds that are safe to retry:
//!
//! - [`with_session_refresh`] forces a logout and a fresh login when the session
//!   token has expired, then tries once more
//! - [`with_backoff`] retries rate-limited calls with capped exponential backoff
//!
//! Everything else propagates immediately.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod classify;
mod context;
mod session_refresh;

pub use backoff::{RetryConfig, backoff_schedule, with_backoff};
pub use classify::{classify, classify_error, classify_upstream};
pub use context::{OperationContext, log_api_error};
pub use session_refresh::with_session_refresh;
