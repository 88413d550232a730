//! Operation context for error logs.

use serde::Serialize;
use tracing::error;
use turnstile_error::TurnstileError;

/// Names the operation being attempted and the resources it touches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationContext {
    operation: String,
    resources: Vec<String>,
}

impl OperationContext {
    /// Context for `operation` with no resources.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            resources: Vec::new(),
        }
    }

    /// Attach the resource ids the operation requests.
    pub fn with_resources<S: AsRef<str>>(mut self, resources: &[S]) -> Self {
        self.resources = resources.iter().map(|r| r.as_ref().to_string()).collect();
        self
    }

    /// The operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The requested resource ids.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }
}

/// Log a failed exchange call with its classification and context.
pub fn log_api_error(error: &TurnstileError, context: &OperationContext) {
    error!(
        operation = %context.operation,
        classification = %error.classification(),
        resources = ?context.resources,
        error = %error,
        "Exchange API error"
    );
}
