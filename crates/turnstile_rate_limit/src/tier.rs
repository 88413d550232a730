//! A single governor-backed admission gate.

use crate::TierConfig;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use tracing::{debug, trace};
use turnstile_error::{ConfigError, TurnstileResult};

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// The independently accounted admission scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    /// Logins and keep-alives
    Login,
    /// Every data request
    General,
    /// Requests touching one resource id
    Resource,
}

/// The governor quota for a tier: one token per emission interval, burst of one.
pub(crate) fn tier_quota(tier: Tier, config: &TierConfig) -> TurnstileResult<Quota> {
    config.validate(tier.as_ref())?;
    Quota::with_period(config.emission_interval()).ok_or_else(|| {
        ConfigError::new(format!(
            "Rate limit tier '{}' has a zero emission interval",
            tier
        ))
        .into()
    })
}

/// Admission gate for one tier.
///
/// Uses GCRA with a burst of one: a token becomes available every
/// `window / rate`, so at most `rate` tokens are handed out in any rolling
/// window and waiters are released evenly rather than in bursts.
pub struct TierLimiter {
    tier: Tier,
    config: TierConfig,
    limiter: DirectRateLimiter,
}

impl std::fmt::Debug for TierLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierLimiter")
            .field("tier", &self.tier)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TierLimiter {
    /// Build a limiter for `tier`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the tier's rate or window is zero.
    pub fn new(tier: Tier, config: TierConfig) -> TurnstileResult<Self> {
        let quota = tier_quota(tier, &config)?;
        Ok(Self::with_quota(tier, config, quota))
    }

    pub(crate) fn with_quota(tier: Tier, config: TierConfig, quota: Quota) -> Self {
        debug!(
            %tier,
            rate = config.rate,
            window_ms = config.window_ms,
            "Created tier limiter"
        );

        Self {
            tier,
            config,
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// The tier this limiter enforces.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// The tier's parameters.
    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        trace!(tier = %self.tier, "Token acquired");
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
