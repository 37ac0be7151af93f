//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `membership` - Subscription records, lifecycle status, checkout metadata
//!   and the error taxonomy of the payment flows

pub mod foundation;
pub mod membership;
