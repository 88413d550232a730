//! Scripted exchange client for tests.

use async_trait::async_trait;
use crate::{AuthMode, Credentials, ExchangeClient};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use turnstile_error::UpstreamError;

/// Exchange client whose failures are queued up front.
///
/// Each operation pops its next scripted failure, if any, and otherwise
/// succeeds. Calls are counted so tests can assert how often the session
/// manager reached the network.
///
/// With [`MockExchangeClient::with_token_checks`] the client behaves like the
/// exchange's token handling: every login issues a new token, logout and
/// [`MockExchangeClient::expire_session`] revoke it, and a query fails with
/// `INVALID_SESSION_TOKEN` when its token is revoked or replaced while in flight.
#[derive(Debug, Default)]
pub struct MockExchangeClient {
    login_delay: Duration,
    login_failures: Mutex<VecDeque<String>>,
    login_always_fails: Option<String>,
    keep_alive_failures: Mutex<VecDeque<String>>,
    logout_failures: Mutex<VecDeque<String>>,
    query_results: Mutex<VecDeque<Result<Value, String>>>,
    last_auth: Mutex<Option<AuthMode>>,
    check_tokens: bool,
    token: AtomicU64,
    token_valid: AtomicBool,
    login_calls: AtomicUsize,
    keep_alive_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl MockExchangeClient {
    /// A client on which every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend inside every login for `delay`.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    /// Every login fails with `message`.
    pub fn with_failing_login(mut self, message: impl Into<String>) -> Self {
        self.login_always_fails = Some(message.into());
        self
    }

    /// Reject queries made without a live token.
    pub fn with_token_checks(mut self) -> Self {
        self.check_tokens = true;
        self
    }

    /// Revoke the current token on the exchange side.
    pub fn expire_session(&self) {
        self.token_valid.store(false, Ordering::SeqCst);
    }

    /// Tokens issued so far.
    pub fn tokens_issued(&self) -> u64 {
        self.token.load(Ordering::SeqCst)
    }

    /// Queue a failure for the next login.
    pub fn fail_next_login(&self, message: impl Into<String>) -> &Self {
        push(&self.login_failures, message.into());
        self
    }

    /// Queue a failure for the next keep-alive.
    pub fn fail_next_keep_alive(&self, message: impl Into<String>) -> &Self {
        push(&self.keep_alive_failures, message.into());
        self
    }

    /// Queue a failure for the next logout.
    pub fn fail_next_logout(&self, message: impl Into<String>) -> &Self {
        push(&self.logout_failures, message.into());
        self
    }

    /// Queue the result of the next query. Queries with nothing queued return `null`.
    pub fn push_query_result(&self, result: Result<Value, String>) -> &Self {
        if let Ok(mut queue) = self.query_results.lock() {
            queue.push_back(result);
        }
        self
    }

    /// Logins attempted so far.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Keep-alives attempted so far.
    pub fn keep_alive_calls(&self) -> usize {
        self.keep_alive_calls.load(Ordering::SeqCst)
    }

    /// Logouts attempted so far.
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    /// Queries attempted so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Authentication mode used by the most recent login.
    pub fn last_auth(&self) -> Option<AuthMode> {
        self.last_auth.lock().ok().and_then(|auth| auth.clone())
    }
}

fn push(queue: &Mutex<VecDeque<String>>, message: String) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(message);
    }
}

fn pop(queue: &Mutex<VecDeque<String>>) -> Option<String> {
    queue.lock().ok().and_then(|mut queue| queue.pop_front())
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    async fn login(
        &self,
        _credentials: &Credentials,
        auth: &AuthMode,
    ) -> Result<(), UpstreamError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_auth.lock() {
            *last = Some(auth.clone());
        }

        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        if let Some(message) = &self.login_always_fails {
            return Err(UpstreamError::new(message.clone()));
        }
        if let Some(message) = pop(&self.login_failures) {
            return Err(UpstreamError::new(message));
        }
        self.token.fetch_add(1, Ordering::SeqCst);
        self.token_valid.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn keep_alive(&self) -> Result<(), UpstreamError> {
        self.keep_alive_calls.fetch_add(1, Ordering::SeqCst);
        match pop(&self.keep_alive_failures) {
            Some(message) => Err(UpstreamError::new(message)),
            None => Ok(()),
        }
    }

    async fn logout(&self) -> Result<(), UpstreamError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.token_valid.store(false, Ordering::SeqCst);
        match pop(&self.logout_failures) {
            Some(message) => Err(UpstreamError::new(message)),
            None => Ok(()),
        }
    }

    async fn query(&self, _method: &str, _params: Value) -> Result<Value, UpstreamError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.check_tokens {
            let token = self.token.load(Ordering::SeqCst);
            if !self.token_valid.load(Ordering::SeqCst) {
                return Err(UpstreamError::new("ANGX-0003 INVALID_SESSION_TOKEN"));
            }
            tokio::task::yield_now().await;
            let replaced = self.token.load(Ordering::SeqCst) != token;
            if replaced || !self.token_valid.load(Ordering::SeqCst) {
                return Err(UpstreamError::new("ANGX-0003 INVALID_SESSION_TOKEN"));
            }
        }
        let next = self
            .query_results
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(UpstreamError::new(message)),
            None => Ok(Value::Null),
        }
    }
}
