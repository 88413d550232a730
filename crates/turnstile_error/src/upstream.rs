//! Raw upstream error types.

/// Failure reported by the exchange client, before classification.
///
/// The message is kept verbatim; classification works on it.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Upstream Error: {} at line {} in {}", message, line, file)]
pub struct UpstreamError {
    /// The message returned by the exchange
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl UpstreamError {
    /// Create a new UpstreamError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use turnstile_error::UpstreamError;
    ///
    /// let err = UpstreamError::new("ANGX-0003: INVALID_SESSION_INFORMATION");
    /// assert!(err.message.contains("SESSION"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
