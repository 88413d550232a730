//! Mapping raw upstream messages onto failure kinds.

use turnstile_error::{
    ApiError, ApiErrorKind, Classification, TurnstileError, TurnstileErrorKind, UpstreamError,
};

const SESSION_PATTERNS: &[&str] = &["INVALID_SESSION_TOKEN", "SESSION"];
const RATE_LIMIT_PATTERNS: &[&str] = &["TOO_MANY_REQUESTS", "TOO MANY REQUESTS"];
const DATA_LIMIT_PATTERNS: &[&str] = &["TOO_MUCH_DATA", "TOO MUCH DATA"];
const THROTTLE_PATTERNS: &[&str] = &["THROTTLED", "TEMPORARY_BAN", "TEMPORARY BAN"];

/// Classify an upstream failure by its message.
///
/// Matching is a case-insensitive substring search; the first matching group
/// wins, in this order: session, rate limit, data limit, throttle.
///
/// ```
/// use turnstile_error::{Classification, UpstreamError};
/// use turnstile_retry::classify;
///
/// let err = UpstreamError::new("APINGException: TOO_MANY_REQUESTS");
/// assert_eq!(classify(&err), Classification::RateLimited);
/// ```
pub fn classify(error: &UpstreamError) -> Classification {
    let message = error.message.to_uppercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if matches(SESSION_PATTERNS) {
        Classification::SessionExpired
    } else if matches(RATE_LIMIT_PATTERNS) {
        Classification::RateLimited
    } else if matches(DATA_LIMIT_PATTERNS) {
        Classification::DataLimitExceeded
    } else if matches(THROTTLE_PATTERNS) {
        Classification::Throttled
    } else {
        Classification::Unclassified
    }
}

/// Re-express an upstream failure as a classified error.
///
/// Unrecognised failures are returned unchanged as an upstream error.
#[track_caller]
pub fn classify_upstream(error: UpstreamError) -> TurnstileError {
    let kind = match classify(&error) {
        Classification::SessionExpired => ApiErrorKind::SessionExpired(error.message),
        Classification::RateLimited => ApiErrorKind::RateLimited(error.message),
        Classification::DataLimitExceeded => ApiErrorKind::DataLimitExceeded(error.message),
        Classification::Throttled => ApiErrorKind::Throttled(error.message),
        Classification::Unclassified => return error.into(),
    };
    ApiError::new(kind).into()
}

/// Classify an error if it is a raw upstream failure; pass anything else through.
#[track_caller]
pub fn classify_error(error: TurnstileError) -> TurnstileError {
    match error.kind() {
        TurnstileErrorKind::Upstream(upstream) => classify_upstream(upstream.clone()),
        _ => error,
    }
}
