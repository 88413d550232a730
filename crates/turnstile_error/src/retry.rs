//! Retry orchestration errors.

use crate::TurnstileError;

/// Ways an automatic recovery can give up.
#[derive(Debug, Clone, derive_more::Display)]
pub enum RetryErrorKind {
    /// Rate-limit backoff ran out of attempts
    #[display("{} failed after {} attempts: {}", operation, attempts, last)]
    Exhausted {
        /// Operation that was being retried
        operation: String,
        /// Number of attempts made
        attempts: usize,
        /// Error from the final attempt
        last: TurnstileError,
    },
    /// The session expired again right after a forced re-login
    #[display("{} failed after session refresh: {}", operation, last)]
    SessionRefreshFailed {
        /// Operation that was being retried
        operation: String,
        /// Error from the attempt made with the fresh session
        last: TurnstileError,
    },
}

/// Retry error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Retry Error: {} at line {} in {}", kind, line, file)]
pub struct RetryError {
    kind: RetryErrorKind,
    line: u32,
    file: &'static str,
}

impl RetryError {
    /// Create a new retry error with caller location tracking.
    #[track_caller]
    pub fn new(kind: RetryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &RetryErrorKind {
        &self.kind
    }

    /// The error from the last attempt before giving up.
    pub fn last(&self) -> &TurnstileError {
        match &self.kind {
            RetryErrorKind::Exhausted { last, .. } => last,
            RetryErrorKind::SessionRefreshFailed { last, .. } => last,
        }
    }
}
