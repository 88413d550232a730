//! Turnstile: a compliance layer for session-authenticated, rate-limited exchange APIs.
//!
//! Turnstile sits between domain operations and an [`ExchangeClient`]. Every call
//! goes through the same pipeline:
//!
//! 1. the request's weight is checked against the exchange's per-request ceiling
//! 2. a token is taken from the appropriate rate limit tier
//! 3. the shared session is made active, logging in if necessary
//! 4. the call runs, recovering from expired sessions and rate limiting
//!
//! Background tasks keep the session alive and bound the per-resource limiter map.
//!
//! # Example
//!
//! ```rust,ignore
//! use turnstile::{ExchangeCall, ExchangeContext, RequestKind};
//!
//! let context = ExchangeContext::from_env(client).await?;
//!
//! let call = ExchangeCall::new("listMarketBook")
//!     .with_kind(RequestKind::book())
//!     .with_resources(&market_ids)
//!     .with_projections(&["EX_BEST_OFFERS"]);
//! let book = context.query(&call, "SportsAPING/v1.0/listMarketBook", params).await?;
//!
//! context.shutdown().await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod maintenance;
mod observability;

pub use config::{TurnstileConfig, WeightConfig};
pub use context::{Admission, ExchangeCall, ExchangeContext};
pub use maintenance::{MaintenanceConfig, MaintenanceTasks, run_cleanup, run_keep_alive};
pub use observability::{
    ObservabilityConfig, init_observability, init_observability_with_config, shutdown_observability,
};

// Re-export the building blocks
pub use turnstile_error::{
    ApiError, ApiErrorKind, Classification, ConfigError, RetryError, RetryErrorKind, SessionError,
    SessionErrorKind, TurnstileError, TurnstileErrorKind, TurnstileResult, UpstreamError,
};
pub use turnstile_rate_limit::{RateLimitConfig, RateLimiter, TierConfig};
pub use turnstile_retry::{
    OperationContext, RetryConfig, backoff_schedule, classify, classify_error, log_api_error,
    with_backoff, with_session_refresh,
};
pub use turnstile_session::{
    AuthMode, CertificatePair, Credentials, ExchangeClient, LoginGate, SessionManager,
    SessionState,
};
pub use turnstile_weight::{RequestKind, WeightBudgeter, chunk_for_data_limit};
