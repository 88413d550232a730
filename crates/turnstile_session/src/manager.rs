//! The process-wide session manager.

use crate::{AuthMode, Credentials, ExchangeClient, LoginGate, resolve_auth_mode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use turnstile_error::{SessionError, SessionErrorKind, TurnstileError, TurnstileResult};

/// Where the shared session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SessionState {
    /// Built but never logged in
    Uninitialized,
    /// Logged in and usable
    Active,
    /// Logged out, expired, or failed a keep-alive
    Inactive,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    // Outcome of the most recent failed login, shared with callers that queued
    // behind it.
    last_login_error: Option<TurnstileError>,
}

/// Owns the single authenticated session.
///
/// Every state transition happens while holding one exclusive lock, so at most
/// one login, keep-alive or logout is in flight at a time. Callers that queue
/// behind an in-flight login observe its outcome instead of starting their own.
///
/// # Example
///
/// ```rust,ignore
/// let session = SessionManager::new(client, Credentials::from_env()?);
/// session.ensure_active().await?;
/// let handle = session.session_handle();
/// ```
pub struct SessionManager {
    client: Arc<dyn ExchangeClient>,
    credentials: Credentials,
    login_gate: Option<Arc<dyn LoginGate>>,
    inner: Mutex<SessionInner>,
    // Bumped under the lock each time a login attempt finishes.
    completed_logins: AtomicU64,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("credentials", &self.credentials)
            .field("completed_logins", &self.completed_logins)
            .field("login_gate", &self.login_gate.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager for the given client and credentials.
    ///
    /// No network call is made; the session starts `Uninitialized`.
    #[instrument(skip_all, fields(username = %credentials.username()))]
    pub fn new(client: Arc<dyn ExchangeClient>, credentials: Credentials) -> Self {
        debug!("Creating session manager");
        Self {
            client,
            credentials,
            login_gate: None,
            inner: Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                last_login_error: None,
            }),
            completed_logins: AtomicU64::new(0),
        }
    }

    /// Wait on `gate` before every login attempt.
    pub fn with_login_gate(mut self, gate: Arc<dyn LoginGate>) -> Self {
        self.login_gate = Some(gate);
        self
    }

    /// The credentials this manager logs in with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The transport handle for domain operations.
    pub fn session_handle(&self) -> Arc<dyn ExchangeClient> {
        Arc::clone(&self.client)
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Whether the session is currently active.
    pub async fn is_active(&self) -> bool {
        self.state().await == SessionState::Active
    }

    /// Number of login attempts that have completed, successful or not.
    pub fn login_count(&self) -> u64 {
        self.completed_logins.load(Ordering::Acquire)
    }

    /// Session generation, bumped each time a login attempt finishes.
    ///
    /// [`SessionManager::active_generation`] returns it together with an active
    /// session, naming the session an operation runs against.
    pub fn generation(&self) -> u64 {
        self.login_count()
    }

    /// Make sure the session is active, logging in if it is not.
    ///
    /// Concurrent callers serialize on the session lock. If a login attempt
    /// finished while this caller was waiting for the lock and that attempt
    /// failed, its error is returned rather than trying again.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unusable certificate files or a session
    /// error when the exchange rejects the login.
    #[instrument(skip(self))]
    pub async fn ensure_active(&self) -> TurnstileResult<()> {
        self.active_generation().await.map(|_| ())
    }

    /// Like [`SessionManager::ensure_active`], returning the generation of the
    /// active session.
    ///
    /// Pass the generation to [`SessionManager::refresh`] if the exchange later
    /// rejects that session.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::ensure_active`].
    pub async fn active_generation(&self) -> TurnstileResult<u64> {
        let seen = self.completed_logins.load(Ordering::Acquire);
        let mut inner = self.inner.lock().await;

        if inner.state != SessionState::Active {
            if self.completed_logins.load(Ordering::Acquire) != seen {
                if let Some(err) = &inner.last_login_error {
                    debug!("Sharing outcome of the login attempt that finished while waiting");
                    return Err(err.clone());
                }
            }
            self.login_locked(&mut inner).await?;
        }

        Ok(self.completed_logins.load(Ordering::Acquire))
    }

    /// Replace the session of generation `stale` after the exchange rejected it.
    ///
    /// Logs out and back in only if no login has finished since `stale`.
    /// Otherwise another caller already replaced the session, and its outcome
    /// is returned without touching the exchange.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::ensure_active`].
    #[instrument(skip(self))]
    pub async fn refresh(&self, stale: u64) -> TurnstileResult<u64> {
        let mut inner = self.inner.lock().await;
        let current = self.completed_logins.load(Ordering::Acquire);

        if current != stale {
            if inner.state == SessionState::Active {
                debug!(stale, current, "Session already refreshed");
                return Ok(current);
            }
            if let Some(err) = &inner.last_login_error {
                return Err(err.clone());
            }
        } else {
            self.logout_locked(&mut inner).await;
        }

        self.login_locked(&mut inner).await?;
        Ok(self.completed_logins.load(Ordering::Acquire))
    }

    /// Log in unconditionally.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::ensure_active`].
    #[instrument(skip(self))]
    pub async fn login(&self) -> TurnstileResult<()> {
        let mut inner = self.inner.lock().await;
        self.login_locked(&mut inner).await
    }

    async fn login_locked(&self, inner: &mut SessionInner) -> TurnstileResult<()> {
        if let Some(gate) = &self.login_gate {
            gate.admit_login().await;
        }
        let result = self.attempt_login().await;

        match &result {
            Ok(()) => {
                inner.state = SessionState::Active;
                inner.last_login_error = None;
                info!(username = %self.credentials.username(), "Logged in to exchange");
            }
            Err(e) => {
                if inner.state == SessionState::Active {
                    inner.state = SessionState::Inactive;
                }
                inner.last_login_error = Some(e.clone());
                error!(error = %e, "Exchange login failed");
            }
        }

        self.completed_logins.fetch_add(1, Ordering::AcqRel);
        result
    }

    async fn attempt_login(&self) -> TurnstileResult<()> {
        let auth = if self.credentials.certificate().is_some() {
            // The permission check touches the filesystem; keep it off the async workers.
            let credentials = self.credentials.clone();
            tokio::task::spawn_blocking(move || resolve_auth_mode(&credentials))
                .await
                .map_err(|e| SessionError::new(SessionErrorKind::TaskFailed(e.to_string())))??
        } else {
            AuthMode::Password
        };

        info!(username = %self.credentials.username(), ?auth, "Logging in to exchange");
        self.client
            .login(&self.credentials, &auth)
            .await
            .map_err(|e| SessionError::new(SessionErrorKind::LoginFailed(e.message)))?;

        Ok(())
    }

    /// Send a keep-alive to reset the session's idle timeout.
    ///
    /// Returns `false` without contacting the exchange when the session is not
    /// active. A failed keep-alive marks the session inactive so the next
    /// [`SessionManager::ensure_active`] logs in again.
    #[instrument(skip(self))]
    pub async fn keep_alive(&self) -> bool {
        let mut inner = self.inner.lock().await;

        if inner.state != SessionState::Active {
            warn!(state = %inner.state, "Cannot send keep-alive: session not active");
            return false;
        }

        debug!("Sending session keep-alive");
        match self.client.keep_alive().await {
            Ok(()) => {
                debug!("Keep-alive successful");
                true
            }
            Err(e) => {
                error!(error = %e, "Keep-alive failed");
                inner.state = SessionState::Inactive;
                false
            }
        }
    }

    /// End the session.
    ///
    /// Idempotent. The session is left inactive even when the exchange rejects
    /// the logout; the failure is only logged.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let mut inner = self.inner.lock().await;
        self.logout_locked(&mut inner).await;
    }

    async fn logout_locked(&self, inner: &mut SessionInner) {
        if inner.state != SessionState::Active {
            debug!(state = %inner.state, "Logout skipped: session not active");
            return;
        }

        info!("Logging out from exchange");
        match self.client.logout().await {
            Ok(()) => info!("Logged out"),
            Err(e) => error!(error = %e, "Logout failed"),
        }
        inner.state = SessionState::Inactive;
    }
}
