//! Top-level error wrapper types.

use crate::{ApiError, Classification, ConfigError, RetryError, SessionError, UpstreamError};

/// Every failure the core can surface.
///
/// # Examples
///
/// ```
/// use turnstile_error::{TurnstileError, UpstreamError};
///
/// let err: TurnstileError = UpstreamError::new("Connection reset").into();
/// assert!(format!("{}", err).contains("Upstream Error"));
/// ```
#[derive(Debug, Clone, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum TurnstileErrorKind {
    /// Fatal configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Unclassified upstream failure, passed through unchanged
    #[from(UpstreamError)]
    Upstream(UpstreamError),
    /// Classified upstream failure
    #[from(ApiError)]
    Api(ApiError),
    /// Session lifecycle failure
    #[from(SessionError)]
    Session(SessionError),
    /// Automatic recovery gave up
    #[from(RetryError)]
    Retry(RetryError),
}

/// Turnstile error with kind discrimination.
///
/// # Examples
///
/// ```
/// use turnstile_error::{ConfigError, TurnstileResult};
///
/// fn might_fail() -> TurnstileResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Turnstile Error: {}", _0)]
pub struct TurnstileError(Box<TurnstileErrorKind>);

impl TurnstileError {
    /// Create a new error from a kind.
    pub fn new(kind: TurnstileErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &TurnstileErrorKind {
        &self.0
    }

    /// Classification of this error as seen by the retry strategies.
    ///
    /// Raw upstream errors report `Unclassified` here; run them through the
    /// classifier first. A retry error reports the classification of its last
    /// attempt.
    pub fn classification(&self) -> Classification {
        match self.kind() {
            TurnstileErrorKind::Api(err) => err.classification(),
            TurnstileErrorKind::Retry(err) => err.last().classification(),
            _ => Classification::Unclassified,
        }
    }

    /// Whether this is a fatal configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self.kind(), TurnstileErrorKind::Config(_))
    }
}

// Generic From implementation for any type that converts to TurnstileErrorKind
impl<T> From<T> for TurnstileError
where
    T: Into<TurnstileErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for turnstile operations.
pub type TurnstileResult<T> = std::result::Result<T, TurnstileError>;
