//! Subscription record and user membership entities.

use serde::{Deserialize, Serialize};

use super::{MembershipKey, SubscriptionStatus};
use crate::domain::foundation::{
    CheckoutSessionId, StateMachine, SubscriptionRecordId, Timestamp, UserId, ValidationError,
};

/// One row per checkout attempt.
///
/// Identity and checkout session are fixed at creation; afterwards only the
/// status moves, and only along [`SubscriptionStatus`] transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionRecordId,
    pub user_id: UserId,
    pub checkout_session_id: CheckoutSessionId,
    /// Gateway price identifier the checkout was opened for.
    pub price_id: String,
    pub status: SubscriptionStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Creates the PENDING record for a freshly opened checkout session.
    pub fn pending(
        user_id: UserId,
        checkout_session_id: CheckoutSessionId,
        price_id: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubscriptionRecordId::new(),
            user_id,
            checkout_session_id,
            price_id: price_id.into(),
            status: SubscriptionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the record to `target`, validating the transition.
    pub fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Returns true if the record was opened for `price_id`.
    pub fn is_for_price(&self, price_id: &str) -> bool {
        self.price_id == price_id
    }
}

/// The slice of a user that the payment flows read and write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMembership {
    pub user_id: UserId,
    pub membership_key: MembershipKey,
    pub membership_expiry: Option<Timestamp>,
}

impl UserMembership {
    /// A user with no membership.
    pub fn without_membership(user_id: UserId) -> Self {
        Self {
            user_id,
            membership_key: MembershipKey::none(),
            membership_expiry: None,
        }
    }

    pub fn has_membership(&self) -> bool {
        self.membership_key.is_member()
    }
}
