//! Tier parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use turnstile_error::{ConfigError, TurnstileResult};

/// Default ceiling on the number of per-resource limiters kept in memory.
pub const DEFAULT_MAX_RESOURCE_LIMITERS: usize = 1000;

/// Admission parameters for one tier: at most `rate` tokens per `window_ms`.
///
/// ```toml
/// [rate_limits.login]
/// rate = 95
/// window_ms = 60_000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TierConfig {
    /// Maximum tokens admitted per window
    pub rate: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl TierConfig {
    /// Create a tier config.
    pub fn new(rate: u32, window: Duration) -> Self {
        Self {
            rate,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Interval between two tokens when traffic is fully smoothed.
    ///
    /// Rounded up to the nanosecond so `rate` intervals never fall short of the window.
    pub fn emission_interval(&self) -> Duration {
        let nanos = self.window().as_nanos().div_ceil(u128::from(self.rate.max(1)));
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Check that the tier can admit anything at all.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming `tier` when the rate or the window is zero.
    pub fn validate(&self, tier: &str) -> TurnstileResult<()> {
        if self.rate == 0 {
            return Err(ConfigError::new(format!(
                "Rate limit tier '{}' has rate 0; it must admit at least one request",
                tier
            ))
            .into());
        }
        if self.window_ms == 0 {
            return Err(ConfigError::new(format!(
                "Rate limit tier '{}' has an empty window; window_ms must be positive",
                tier
            ))
            .into());
        }
        Ok(())
    }
}

/// Parameters for every tier plus the per-resource limiter ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Authentication and keep-alive tier
    pub login: TierConfig,
    /// Account-wide tier
    pub general: TierConfig,
    /// Per-resource tier
    pub resource: TierConfig,
    /// Per-resource limiters kept after a cleanup pass
    #[serde(default = "default_max_resource_limiters")]
    pub max_resource_limiters: usize,
}

fn default_max_resource_limiters() -> usize {
    DEFAULT_MAX_RESOURCE_LIMITERS
}

impl Default for RateLimitConfig {
    // 95 logins per minute leaves headroom under the exchange's 100/min cap.
    fn default() -> Self {
        Self {
            login: TierConfig::new(95, Duration::from_secs(60)),
            general: TierConfig::new(20, Duration::from_secs(1)),
            resource: TierConfig::new(5, Duration::from_secs(1)),
            max_resource_limiters: DEFAULT_MAX_RESOURCE_LIMITERS,
        }
    }
}

impl RateLimitConfig {
    /// Validate every tier.
    ///
    /// # Errors
    ///
    /// Returns the first tier that cannot admit requests.
    pub fn validate(&self) -> TurnstileResult<()> {
        self.login.validate("login")?;
        self.general.validate("general")?;
        self.resource.validate("resource")?;
        Ok(())
    }
}
