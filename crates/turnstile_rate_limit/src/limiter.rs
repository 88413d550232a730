//! The multi-tier rate limiter.

use crate::{RateLimitConfig, Tier, TierConfig, TierLimiter};
use crate::tier::tier_quota;
use governor::Quota;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use turnstile_error::TurnstileResult;

#[derive(Debug)]
struct ResourceEntry {
    limiter: Arc<TierLimiter>,
    // Sequence number of the most recent acquisition.
    last_used: u64,
}

/// Enforces the login, general and per-resource tiers.
///
/// Per-resource limiters are created on first use and kept in a map guarded
/// by its own lock. The map is bounded by [`RateLimiter::evict_stale`], which
/// drops the least recently acquired entries first.
///
/// Acquisition never fails: every `acquire_*` call suspends until its tier
/// has a token.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RateLimiter::new(&RateLimitConfig::default())?;
///
/// limiter.acquire_login().await;
/// session.login().await?;
///
/// limiter.acquire_resources(&market_ids).await;
/// client.query("listMarketBook", params).await?;
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    login: TierLimiter,
    general: TierLimiter,
    resource_config: TierConfig,
    resource_quota: Quota,
    resources: Mutex<HashMap<String, ResourceEntry>>,
    clock: AtomicU64,
}

impl RateLimiter {
    /// Build the login and general tiers and an empty per-resource map.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when any tier has a zero rate or window.
    #[instrument(skip(config))]
    pub fn new(config: &RateLimitConfig) -> TurnstileResult<Self> {
        config.validate()?;

        info!(
            login_rate = config.login.rate,
            general_rate = config.general.rate,
            resource_rate = config.resource.rate,
            "Initializing rate limiter"
        );

        Ok(Self {
            login: TierLimiter::new(Tier::Login, config.login)?,
            general: TierLimiter::new(Tier::General, config.general)?,
            resource_config: config.resource,
            resource_quota: tier_quota(Tier::Resource, &config.resource)?,
            resources: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        })
    }

    /// Wait for a login-tier token.
    #[instrument(skip(self))]
    pub async fn acquire_login(&self) {
        self.login.acquire().await;
        debug!("Acquired login rate limit token");
    }

    /// Wait for a general-tier token.
    #[instrument(skip(self))]
    pub async fn acquire_general(&self) {
        self.general.acquire().await;
        debug!("Acquired general rate limit token");
    }

    /// Wait for a token from the limiter of `resource_id`, creating it on first use.
    #[instrument(skip(self))]
    pub async fn acquire_resource(&self, resource_id: &str) {
        let limiter = self.resource_limiter(resource_id).await;
        limiter.acquire().await;
        debug!(resource_id, "Acquired resource rate limit token");
    }

    /// Wait for a single general-tier token covering a whole batch of resources.
    ///
    /// Batch requests count once against the account-wide rate; the
    /// per-resource tiers are not consulted.
    #[instrument(skip(self, resource_ids), fields(count = resource_ids.len()))]
    pub async fn acquire_resources<S: AsRef<str>>(&self, resource_ids: &[S]) {
        self.general.acquire().await;
        debug!(count = resource_ids.len(), "Acquired rate limit token for resource batch");
    }

    async fn resource_limiter(&self, resource_id: &str) -> Arc<TierLimiter> {
        let mut resources = self.resources.lock().await;
        let stamp = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = resources.get_mut(resource_id) {
            entry.last_used = stamp;
            return Arc::clone(&entry.limiter);
        }

        let limiter = Arc::new(TierLimiter::with_quota(
            Tier::Resource,
            self.resource_config,
            self.resource_quota,
        ));
        resources.insert(
            resource_id.to_string(),
            ResourceEntry {
                limiter: Arc::clone(&limiter),
                last_used: stamp,
            },
        );
        debug!(resource_id, total = resources.len(), "Created resource limiter");
        limiter
    }

    /// Shrink the per-resource map to at most `max_entries`.
    ///
    /// The least recently acquired limiters go first. A removed id gets a
    /// fresh limiter the next time it is acquired. Returns the number of
    /// limiters removed.
    #[instrument(skip(self))]
    pub async fn evict_stale(&self, max_entries: usize) -> usize {
        let mut resources = self.resources.lock().await;
        if resources.len() <= max_entries {
            return 0;
        }

        let excess = resources.len() - max_entries;
        let mut by_age: Vec<(u64, String)> = resources
            .iter()
            .map(|(id, entry)| (entry.last_used, id.clone()))
            .collect();
        by_age.sort_unstable();

        for (_, id) in by_age.into_iter().take(excess) {
            resources.remove(&id);
        }

        info!(
            removed = excess,
            remaining = resources.len(),
            "Evicted stale resource limiters"
        );
        excess
    }

    /// Number of per-resource limiters currently held.
    pub async fn resource_count(&self) -> usize {
        self.resources.lock().await.len()
    }

    /// Whether a limiter exists for `resource_id`.
    pub async fn contains_resource(&self, resource_id: &str) -> bool {
        self.resources.lock().await.contains_key(resource_id)
    }

    /// Take a token for `resource_id` without waiting.
    pub async fn try_acquire_resource(&self, resource_id: &str) -> bool {
        self.resource_limiter(resource_id).await.try_acquire()
    }
}
