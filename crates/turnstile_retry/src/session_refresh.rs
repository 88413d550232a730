//! Recovery from expired session tokens.

use crate::{OperationContext, classify_error, log_api_error};
use std::future::Future;
use tracing::{info, instrument, warn};
use turnstile_error::{Classification, RetryError, RetryErrorKind, TurnstileResult};
use turnstile_session::SessionManager;

/// Run `op` with an active session, refreshing it once if the token expired.
///
/// The session is made active before every attempt. When the first attempt
/// fails with an expired session, that session is replaced and `op` runs once
/// more. Concurrent callers that saw the same session expire share one
/// replacement. A second session failure is fatal; any other failure
/// propagates immediately.
///
/// # Errors
///
/// Login failures from [`SessionManager::ensure_active`], the classified error
/// from `op`, or a [`RetryErrorKind::SessionRefreshFailed`] when the fresh
/// session is rejected too.
#[instrument(skip(session, op), fields(operation = %context.operation()))]
pub async fn with_session_refresh<F, Fut, T>(
    session: &SessionManager,
    context: &OperationContext,
    op: F,
) -> TurnstileResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = TurnstileResult<T>>,
{
    let generation = session.active_generation().await?;

    let err = match op().await {
        Ok(value) => return Ok(value),
        Err(e) => classify_error(e),
    };
    if err.classification() != Classification::SessionExpired {
        log_api_error(&err, context);
        return Err(err);
    }

    warn!(
        operation = %context.operation(),
        error = %err,
        "Session expired, refreshing"
    );
    session.refresh(generation).await?;
    info!(operation = %context.operation(), "Session refreshed, retrying");

    match op().await.map_err(|e| classify_error(e)) {
        Ok(value) => Ok(value),
        Err(err) if err.classification() == Classification::SessionExpired => {
            log_api_error(&err, context);
            Err(RetryError::new(RetryErrorKind::SessionRefreshFailed {
                operation: context.operation().to_string(),
                last: err,
            })
            .into())
        }
        Err(err) => {
            log_api_error(&err, context);
            Err(err)
        }
    }
}
