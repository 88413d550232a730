//! The process-wide exchange context.

use crate::{MaintenanceTasks, TurnstileConfig};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use turnstile_error::{TurnstileError, TurnstileResult};
use turnstile_rate_limit::RateLimiter;
use turnstile_retry::{OperationContext, with_backoff, with_session_refresh};
use turnstile_session::{Credentials, ExchangeClient, LoginGate, SessionManager};
use turnstile_weight::{RequestKind, WeightBudgeter, chunk_for_data_limit};

/// Which rate limit tier admits a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// One general-tier token
    General,
    /// One token from the resource's own tier, then one general-tier token
    Resource(String),
    /// One general-tier token for the whole batch
    Batch(Vec<String>),
}

/// Description of one exchange call: its name, weight inputs and resources.
///
/// Calls without a [`RequestKind`] are not weighed (account and navigation
/// calls); market data calls set one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeCall {
    operation: String,
    kind: Option<RequestKind>,
    resources: Vec<String>,
    projections: Vec<String>,
}

impl ExchangeCall {
    /// An unweighted call with no resources.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Weigh the call as `kind`.
    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Resource ids the call requests.
    pub fn with_resources<S: AsRef<str>>(mut self, resources: &[S]) -> Self {
        self.resources = resources.iter().map(|r| r.as_ref().to_string()).collect();
        self
    }

    /// Field projections the call requests.
    pub fn with_projections<S: AsRef<str>>(mut self, projections: &[S]) -> Self {
        self.projections = projections.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Requested resource ids.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Tier admission for this call, from its resource count.
    pub fn admission(&self) -> Admission {
        match self.resources.as_slice() {
            [] => Admission::General,
            [single] => Admission::Resource(single.clone()),
            many => Admission::Batch(many.to_vec()),
        }
    }

    /// Weight of the call, zero when it has no request kind.
    pub fn cost(&self, budgeter: &WeightBudgeter) -> u32 {
        match self.kind {
            Some(kind) => budgeter.cost(kind, self.resources.len(), &self.projections),
            None => 0,
        }
    }

    fn for_resources(&self, resources: Vec<String>) -> Self {
        Self {
            resources,
            ..self.clone()
        }
    }

    fn context(&self) -> OperationContext {
        OperationContext::new(self.operation.clone()).with_resources(&self.resources)
    }
}

/// Spends a login-tier token before every login the session manager attempts.
#[derive(Debug)]
struct LoginTier(Arc<RateLimiter>);

#[async_trait]
impl LoginGate for LoginTier {
    async fn admit_login(&self) {
        self.0.acquire_login().await;
    }
}

/// Owns the rate limiter, the shared session and the background tasks.
///
/// Build one per process with [`ExchangeContext::start`] and pass it by
/// reference. Every call made through [`ExchangeContext::execute`] is weighed,
/// admitted by the rate limiter, run against an active session and recovered
/// from expired sessions and rate limiting.
#[derive(Debug)]
pub struct ExchangeContext {
    config: TurnstileConfig,
    limiter: Arc<RateLimiter>,
    session: Arc<SessionManager>,
    budgeter: WeightBudgeter,
    maintenance: Mutex<Option<MaintenanceTasks>>,
}

impl ExchangeContext {
    /// Build the limiter and session, log in, and start the background tasks.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings or key permissions,
    /// or a session error when the initial login fails. No background task is
    /// left running on error.
    #[instrument(skip_all, fields(username = %credentials.username()))]
    pub async fn start(
        config: TurnstileConfig,
        client: Arc<dyn ExchangeClient>,
        credentials: Credentials,
    ) -> TurnstileResult<Self> {
        info!("Starting exchange context");
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(&config.rate_limits)?);
        let session = Arc::new(
            SessionManager::new(client, credentials)
                .with_login_gate(Arc::new(LoginTier(Arc::clone(&limiter)))),
        );
        let budgeter = config.weight.budgeter()?;

        session.ensure_active().await?;

        let maintenance = MaintenanceTasks::spawn(
            Arc::clone(&session),
            Arc::clone(&limiter),
            config.maintenance,
            config.rate_limits.max_resource_limiters,
        );
        info!("Exchange context ready");

        Ok(Self {
            config,
            limiter,
            session,
            budgeter,
            maintenance: Mutex::new(Some(maintenance)),
        })
    }

    /// Load `.env`, configuration and credentials from the environment, then start.
    ///
    /// # Errors
    ///
    /// Same as [`ExchangeContext::start`], plus missing credential variables.
    pub async fn from_env(client: Arc<dyn ExchangeClient>) -> TurnstileResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env");
        }
        let config = TurnstileConfig::load()?;
        let credentials = Credentials::from_env()?;
        Self::start(config, client, credentials).await
    }

    /// The configuration the context was started with.
    pub fn config(&self) -> &TurnstileConfig {
        &self.config
    }

    /// The shared rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// The shared session manager.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The weight budgeter.
    pub fn budgeter(&self) -> &WeightBudgeter {
        &self.budgeter
    }

    /// The transport handle for domain operations.
    pub fn session_handle(&self) -> Arc<dyn ExchangeClient> {
        self.session.session_handle()
    }

    /// Make the session active.
    ///
    /// Every login, including forced re-logins after an expired session,
    /// spends a login-tier token.
    ///
    /// # Errors
    ///
    /// Propagates login failures.
    pub async fn ensure_session(&self) -> TurnstileResult<()> {
        self.session.ensure_active().await
    }

    /// Check the call's weight and wait for its rate limit tokens.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the call is heavier than the ceiling;
    /// no token is spent in that case.
    #[instrument(skip(self, call), fields(operation = %call.operation()))]
    pub async fn admit(&self, call: &ExchangeCall) -> TurnstileResult<()> {
        self.budgeter.validate(call.cost(&self.budgeter), call.operation())?;

        match call.admission() {
            Admission::General => self.limiter.acquire_general().await,
            Admission::Resource(id) => {
                self.limiter.acquire_resource(&id).await;
                self.limiter.acquire_general().await;
            }
            Admission::Batch(ids) => self.limiter.acquire_resources(&ids).await,
        }
        Ok(())
    }

    /// Run `op` through the full pipeline.
    ///
    /// Weight check, rate limit admission, session activation, then `op` with
    /// session refresh around rate-limit backoff.
    ///
    /// # Errors
    ///
    /// Configuration errors for overweight calls, login failures, classified
    /// errors from `op`, or a retry error once recovery gives up.
    #[instrument(
        skip(self, call, op),
        fields(operation = %call.operation(), resources = call.resources().len())
    )]
    pub async fn execute<F, Fut, T>(&self, call: &ExchangeCall, op: F) -> TurnstileResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = TurnstileResult<T>>,
    {
        self.admit(call).await?;
        self.ensure_session().await?;

        let context = call.context();
        let (retry, context, op) = (&self.config.retry, &context, &op);
        with_session_refresh(&self.session, context, move || {
            with_backoff(retry, context, op)
        })
        .await
    }

    /// Send a JSON-RPC style query through [`ExchangeContext::execute`].
    ///
    /// # Errors
    ///
    /// Same as [`ExchangeContext::execute`].
    pub async fn query(
        &self,
        call: &ExchangeCall,
        method: &str,
        params: Value,
    ) -> TurnstileResult<Value> {
        let client = self.session_handle();
        self.execute(call, || {
            let client = Arc::clone(&client);
            let params = params.clone();
            async move {
                client
                    .query(method, params)
                    .await
                    .map_err(TurnstileError::from)
            }
        })
        .await
    }

    /// Run `op` once per chunk of the call's resources.
    ///
    /// Weighted calls are split so each chunk fits the weight ceiling;
    /// unweighted calls are split into chunks of `weight.data_limit_chunk`.
    /// Results come back in chunk order.
    ///
    /// # Errors
    ///
    /// Stops at the first chunk that fails.
    #[instrument(
        skip(self, call, op),
        fields(operation = %call.operation(), resources = call.resources().len())
    )]
    pub async fn execute_split<F, Fut, T>(
        &self,
        call: &ExchangeCall,
        op: F,
    ) -> TurnstileResult<Vec<T>>
    where
        F: Fn(Vec<String>) -> Fut,
        Fut: Future<Output = TurnstileResult<T>>,
    {
        let chunks = match call.kind {
            Some(kind) => self.budgeter.split(kind, &call.resources, &call.projections)?,
            None => chunk_for_data_limit(&call.resources, self.config.weight.data_limit_chunk),
        };

        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let chunk_call = call.for_resources(chunk);
            let ids = chunk_call.resources.clone();
            results.push(self.execute(&chunk_call, || op(ids.clone())).await?);
        }
        Ok(results)
    }

    /// Stop the background tasks, then log out.
    ///
    /// Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        if let Some(tasks) = self.maintenance.lock().await.take() {
            info!("Shutting down exchange context");
            tasks.shutdown().await;
        }
        self.session.logout().await;
    }
}
