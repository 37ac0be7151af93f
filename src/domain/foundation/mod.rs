//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types used across the
//! membership domain.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CheckoutSessionId, SubscriptionRecordId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
