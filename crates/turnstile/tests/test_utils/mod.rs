//! Shared fixtures for facade tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use turnstile::{Credentials, RateLimitConfig, TierConfig, TurnstileConfig};
use turnstile_session::testing::MockExchangeClient;

/// Configuration whose tiers never make a test wait on the wall clock.
pub fn fast_config() -> TurnstileConfig {
    let unthrottled = TierConfig::new(u32::MAX, Duration::from_secs(1));
    TurnstileConfig {
        rate_limits: RateLimitConfig {
            login: unthrottled,
            general: unthrottled,
            resource: unthrottled,
            max_resource_limiters: 10,
        },
        ..TurnstileConfig::default()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("punter", "hunter2", "app-key")
}

pub fn mock_client() -> Arc<MockExchangeClient> {
    Arc::new(MockExchangeClient::new())
}
