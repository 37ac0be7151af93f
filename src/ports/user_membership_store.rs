//! User membership store port.
//!
//! Users belong to the account subsystem. The payment flows touch exactly two
//! fields on them, and this port exposes exactly those.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::membership::{MembershipKey, UserMembership};

/// Read/write access to a user's membership fields.
#[async_trait]
pub trait UserMembershipStore: Send + Sync {
    /// The user's membership fields, or `None` if the user does not exist.
    async fn find(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError>;

    /// Grant `membership_key` until `membership_expiry`.
    ///
    /// Fails with `ErrorCode::NotFound` if the user does not exist.
    async fn set_membership(
        &self,
        user_id: &UserId,
        membership_key: &MembershipKey,
        membership_expiry: Timestamp,
    ) -> Result<(), DomainError>;

    /// Clear the membership key; the expiry is left as recorded.
    ///
    /// Fails with `ErrorCode::NotFound` if the user does not exist.
    async fn clear_membership_key(&self, user_id: &UserId) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_membership_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn UserMembershipStore) {}
    }
}
