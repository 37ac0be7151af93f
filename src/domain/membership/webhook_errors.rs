//! Failures raised while reconciling a verified webhook event.
//!
//! These never reach the gateway as errors; the reconciler folds them into
//! its outcome and the HTTP layer applies the acknowledgement policy.

use thiserror::Error;

/// Errors that occur during webhook reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Required metadata key missing from the checkout session.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A gateway call made during reconciliation failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A store call made during reconciliation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A stored record refused the requested transition.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

impl WebhookError {
    /// Returns true if a redelivery of the same event could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Gateway(_) | WebhookError::Store(_))
    }
}
