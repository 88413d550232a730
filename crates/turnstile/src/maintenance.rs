//! Background session keep-alive and limiter cleanup.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};
use turnstile_error::{ConfigError, TurnstileResult};
use turnstile_rate_limit::RateLimiter;
use turnstile_session::SessionManager;

/// Cadence of the background tasks.
///
/// ```toml
/// [maintenance]
/// keep_alive_interval_secs = 1800
/// cleanup_interval_secs = 3600
/// max_keep_alive_failures = 3
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct MaintenanceConfig {
    /// Seconds between keep-alives
    pub keep_alive_interval_secs: u64,
    /// Seconds between limiter cleanup passes
    pub cleanup_interval_secs: u64,
    /// Consecutive keep-alive failures before a forced re-login
    pub max_keep_alive_failures: u32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval_secs: 30 * 60,
            cleanup_interval_secs: 60 * 60,
            max_keep_alive_failures: 3,
        }
    }
}

impl MaintenanceConfig {
    /// Time between keep-alives.
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    /// Time between cleanup passes.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Reject intervals that would spin.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero interval or failure threshold.
    pub fn validate(&self) -> TurnstileResult<()> {
        if self.keep_alive_interval_secs == 0 || self.cleanup_interval_secs == 0 {
            return Err(
                ConfigError::new("maintenance intervals must be at least one second").into(),
            );
        }
        if self.max_keep_alive_failures == 0 {
            return Err(
                ConfigError::new("maintenance.max_keep_alive_failures must be at least 1").into(),
            );
        }
        Ok(())
    }
}

/// Keep the session alive until `token` is cancelled.
///
/// Every interval a login-tier token is spent on a keep-alive. After
/// `max_keep_alive_failures` consecutive failures the session is logged out
/// and logged in again; the count resets on any success. The re-login spends
/// a login-tier token through the session's login gate, if it has one.
pub async fn run_keep_alive(
    session: Arc<SessionManager>,
    limiter: Arc<RateLimiter>,
    config: MaintenanceConfig,
    token: CancellationToken,
) {
    let interval = config.keep_alive_interval();
    let max_failures = config.max_keep_alive_failures;
    let mut failures = 0u32;

    info!(interval_secs = interval.as_secs(), "Keep-alive task started");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Keep-alive task stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        tokio::select! {
            _ = token.cancelled() => {
                info!("Keep-alive task stopping");
                return;
            }
            _ = limiter.acquire_login() => {}
        }

        debug!("Sending keep-alive");

        if session.keep_alive().await {
            failures = 0;
            continue;
        }

        failures += 1;
        warn!(failures, max_failures, "Keep-alive failed");

        if failures >= max_failures {
            error!(failures, "Too many keep-alive failures, forcing re-login");
            session.logout().await;
            match session.ensure_active().await {
                Ok(()) => {
                    failures = 0;
                    info!("Re-logged in after keep-alive failures");
                }
                Err(e) => error!(error = %e, "Re-login after keep-alive failures failed"),
            }
        }
    }
}

/// Evict stale per-resource limiters every interval until `token` is cancelled.
pub async fn run_cleanup(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    max_entries: usize,
    token: CancellationToken,
) {
    info!(
        interval_secs = interval.as_secs(),
        max_entries, "Limiter cleanup task started"
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Limiter cleanup task stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let removed = limiter.evict_stale(max_entries).await;
        debug!(removed, "Limiter cleanup pass complete");
    }
}

/// Handles to the running background tasks.
///
/// Dropping the handles without [`MaintenanceTasks::shutdown`] still cancels
/// the tasks; they stop at their next await point.
#[derive(Debug)]
pub struct MaintenanceTasks {
    token: CancellationToken,
    _guard: DropGuard,
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceTasks {
    /// Spawn the keep-alive and cleanup tasks.
    pub fn spawn(
        session: Arc<SessionManager>,
        limiter: Arc<RateLimiter>,
        config: MaintenanceConfig,
        max_resource_limiters: usize,
    ) -> Self {
        let token = CancellationToken::new();

        let keep_alive = tokio::spawn(run_keep_alive(
            session,
            Arc::clone(&limiter),
            config,
            token.clone(),
        ));
        let cleanup = tokio::spawn(run_cleanup(
            limiter,
            config.cleanup_interval(),
            max_resource_limiters,
            token.clone(),
        ));

        Self {
            _guard: token.clone().drop_guard(),
            token,
            handles: vec![keep_alive, cleanup],
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the tasks and wait for them to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Background tasks stopped");
    }
}
