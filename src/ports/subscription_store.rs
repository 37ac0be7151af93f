//! Subscription store port.
//!
//! Persistence for [`SubscriptionRecord`]s. Each call is an independent,
//! atomic single-row operation; there are no multi-row transactions, so
//! callers order their writes and rely on update-by-filter semantics.

use async_trait::async_trait;

use crate::domain::foundation::{CheckoutSessionId, DomainError, UserId};
use crate::domain::membership::{SubscriptionRecord, SubscriptionStatus};

/// Store for subscription records.
///
/// # Errors
///
/// - `ErrorCode::DatabaseError` when the store is unreachable or fails
/// - `ErrorCode::ValidationFailed` when a stored row cannot be decoded
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a new record. Checkout session ids are unique.
    async fn insert(&self, record: &SubscriptionRecord) -> Result<(), DomainError>;

    /// Records of `user_id` currently in `status`, oldest first.
    async fn find_by_user_and_status(
        &self,
        user_id: &UserId,
        status: SubscriptionStatus,
    ) -> Result<Vec<SubscriptionRecord>, DomainError>;

    /// The record created for a checkout session, if any.
    async fn find_by_checkout_session_id(
        &self,
        checkout_session_id: &CheckoutSessionId,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Whether the user has any record at all, in any status.
    async fn has_any_for_user(&self, user_id: &UserId) -> Result<bool, DomainError>;

    /// Update-by-filter: set `to` on the record for `checkout_session_id`
    /// only while it is still in `from`.
    ///
    /// Returns `true` if a record matched the filter and was updated.
    async fn update_status(
        &self,
        checkout_session_id: &CheckoutSessionId,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, DomainError>;
}
