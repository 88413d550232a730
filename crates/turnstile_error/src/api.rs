//! Classified upstream failures.

/// The closed set of failure kinds an upstream error can be mapped to.
///
/// Only [`Classification::SessionExpired`] and [`Classification::RateLimited`]
/// are recovered automatically.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum Classification {
    /// The session token is invalid or expired
    SessionExpired,
    /// The exchange rejected the call for exceeding its request rate
    RateLimited,
    /// The request asked for more data than the exchange allows
    DataLimitExceeded,
    /// The account is throttled or temporarily banned
    Throttled,
    /// No known pattern matched
    Unclassified,
}

impl Classification {
    /// Whether the core retries this kind on its own.
    pub fn is_auto_retried(&self) -> bool {
        matches!(
            self,
            Classification::SessionExpired | Classification::RateLimited
        )
    }
}

/// Recognised upstream failure conditions.
///
/// Each variant carries the original upstream message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ApiErrorKind {
    /// Session token invalid or expired
    #[display("Session expired or invalid: {}", _0)]
    SessionExpired(String),
    /// Request rate exceeded
    #[display("Rate limit exceeded: {}", _0)]
    RateLimited(String),
    /// Request contains too much data
    #[display(
        "Request contains too much data: {} (split the request into smaller chunks)",
        _0
    )]
    DataLimitExceeded(String),
    /// Temporarily throttled or banned
    #[display(
        "Temporarily throttled or banned: {} (back off before sending further requests)",
        _0
    )]
    Throttled(String),
}

impl ApiErrorKind {
    /// The classification this kind corresponds to.
    pub fn classification(&self) -> Classification {
        match self {
            ApiErrorKind::SessionExpired(_) => Classification::SessionExpired,
            ApiErrorKind::RateLimited(_) => Classification::RateLimited,
            ApiErrorKind::DataLimitExceeded(_) => Classification::DataLimitExceeded,
            ApiErrorKind::Throttled(_) => Classification::Throttled,
        }
    }

    /// The original upstream message.
    pub fn message(&self) -> &str {
        match self {
            ApiErrorKind::SessionExpired(msg)
            | ApiErrorKind::RateLimited(msg)
            | ApiErrorKind::DataLimitExceeded(msg)
            | ApiErrorKind::Throttled(msg) => msg,
        }
    }
}

/// Classified upstream error with source location tracking.
///
/// # Examples
///
/// ```
/// use turnstile_error::{ApiError, ApiErrorKind, Classification};
///
/// let err = ApiError::new(ApiErrorKind::RateLimited("TOO_MANY_REQUESTS".into()));
/// assert_eq!(err.classification(), Classification::RateLimited);
/// assert!(format!("{}", err).contains("Rate limit exceeded"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("API Error: {} at line {} in {}", kind, line, file)]
pub struct ApiError {
    /// The kind of error that occurred
    pub kind: ApiErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ApiError {
    /// Create a new ApiError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ApiErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ApiErrorKind {
        &self.kind
    }

    /// The classification of this error.
    pub fn classification(&self) -> Classification {
        self.kind.classification()
    }
}
