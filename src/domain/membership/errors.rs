//! Membership-specific error types.
//!
//! Errors surfaced by the checkout, cancellation and query handlers.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | AuthenticationRequired | 401 |
//! | UserNotFound | 404 |
//! | NotFound | 404 |
//! | GatewayLookupError | 422 |
//! | NoActiveSubscription | 409 |
//! | InvalidState | 409 |
//! | SignatureVerificationFailed | 400 |
//! | ValidationFailed | 400 |
//! | GatewayUnavailable | 502 |
//! | StoreUnavailable | 503 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId, ValidationError};

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// No valid session accompanied the request.
    AuthenticationRequired,

    /// The user the operation targets does not exist.
    UserNotFound(UserId),

    /// A store filter matched nothing where a match was required.
    NotFound(String),

    /// The requested tier or object is unknown to the gateway.
    GatewayLookupError(String),

    /// The gateway could not be reached or answered with a failure.
    GatewayUnavailable(String),

    /// The record store could not be reached or failed.
    StoreUnavailable(String),

    /// Cancellation requested with nothing to cancel.
    NoActiveSubscription(UserId),

    /// Webhook payload not trusted.
    SignatureVerificationFailed(String),

    /// Validation failed.
    ValidationFailed {
        field: String,
        message: String,
    },

    /// Invalid state for the requested operation.
    InvalidState {
        current: String,
        attempted: String,
    },
}

impl MembershipError {
    pub fn user_not_found(user_id: UserId) -> Self {
        MembershipError::UserNotFound(user_id)
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        MembershipError::NotFound(what.into())
    }

    pub fn gateway_lookup(message: impl Into<String>) -> Self {
        MembershipError::GatewayLookupError(message.into())
    }

    pub fn gateway_unavailable(message: impl Into<String>) -> Self {
        MembershipError::GatewayUnavailable(message.into())
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        MembershipError::StoreUnavailable(message.into())
    }

    pub fn no_active_subscription(user_id: UserId) -> Self {
        MembershipError::NoActiveSubscription(user_id)
    }

    pub fn signature_verification_failed(reason: impl Into<String>) -> Self {
        MembershipError::SignatureVerificationFailed(reason.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        MembershipError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::AuthenticationRequired => ErrorCode::Unauthorized,
            MembershipError::UserNotFound(_) => ErrorCode::UserNotFound,
            MembershipError::NotFound(_) => ErrorCode::NotFound,
            MembershipError::GatewayLookupError(_) => ErrorCode::GatewayLookupFailed,
            MembershipError::GatewayUnavailable(_) => ErrorCode::GatewayUnavailable,
            MembershipError::StoreUnavailable(_) => ErrorCode::DatabaseError,
            MembershipError::NoActiveSubscription(_) => ErrorCode::NoActiveSubscription,
            MembershipError::SignatureVerificationFailed(_) => {
                ErrorCode::SignatureVerificationFailed
            }
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            MembershipError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
        }
    }

    /// Returns a user-facing error message.
    ///
    /// Infrastructure failures collapse to a generic message; the detail is
    /// only logged.
    pub fn message(&self) -> String {
        match self {
            MembershipError::AuthenticationRequired => "Authentication is required".to_string(),
            MembershipError::UserNotFound(user_id) => format!("User not found: {}", user_id),
            MembershipError::NotFound(what) => format!("Not found: {}", what),
            MembershipError::GatewayLookupError(detail) => {
                format!("Unknown membership: {}", detail)
            }
            MembershipError::GatewayUnavailable(_) | MembershipError::StoreUnavailable(_) => {
                "Something went wrong.".to_string()
            }
            MembershipError::NoActiveSubscription(user_id) => {
                format!("User {} has no active subscription", user_id)
            }
            MembershipError::SignatureVerificationFailed(_) => {
                "Invalid webhook signature".to_string()
            }
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            MembershipError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
        }
    }

    /// Internal detail for logs; may contain gateway or store text.
    pub fn detail(&self) -> String {
        match self {
            MembershipError::GatewayUnavailable(detail)
            | MembershipError::StoreUnavailable(detail)
            | MembershipError::SignatureVerificationFailed(detail) => detail.clone(),
            other => other.message(),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MembershipError::GatewayUnavailable(_) | MembershipError::StoreUnavailable(_)
        )
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl std::error::Error for MembershipError {}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::NotFound => MembershipError::NotFound(err.message),
            ErrorCode::ValidationFailed => MembershipError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::InvalidStateTransition => MembershipError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.message,
            },
            _ => MembershipError::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        MembershipError::ValidationFailed {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}
