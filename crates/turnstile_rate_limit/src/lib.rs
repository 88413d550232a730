//! Request admission for an exchange API with several independent quotas.
//!
//! Three tiers are enforced:
//! - **login**: a small per-minute budget for authentication and keep-alives
//! - **general**: the account-wide request rate
//! - **resource**: a separate budget per resource id, created on first use
//!
//! Each tier is a GCRA limiter from the `governor` crate with a burst of one, so
//! tokens are released evenly across the window and no tier ever admits more than
//! `rate` requests in any rolling window.
//!
//! # Example
//!
//! ```rust,ignore
//! use turnstile_rate_limit::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(&RateLimitConfig::default())?;
//! limiter.acquire_general().await;
//! limiter.acquire_resource("1.234567").await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limiter;
mod tier;

pub use config::{DEFAULT_MAX_RESOURCE_LIMITERS, RateLimitConfig, TierConfig};
pub use limiter::RateLimiter;
pub use tier::{Tier, TierLimiter};
