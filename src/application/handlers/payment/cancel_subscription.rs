//! CancelSubscriptionHandler - ends a user's active subscription.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::{MembershipError, SubscriptionRecord, SubscriptionStatus};
use crate::ports::{PaymentGateway, SubscriptionStore, UserMembershipStore};

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
}

/// Result of a successful cancellation.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    /// The record, now CANCELLED.
    pub record: SubscriptionRecord,
}

/// Handler for cancelling subscriptions.
///
/// The gateway subscription is cancelled first; local state changes only
/// once the gateway has confirmed.
pub struct CancelSubscriptionHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    users: Arc<dyn UserMembershipStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        users: Arc<dyn UserMembershipStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            subscriptions,
            users,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, MembershipError> {
        // 1. Newest ACTIVE record
        let mut record = self
            .subscriptions
            .find_by_user_and_status(&cmd.user_id, SubscriptionStatus::Active)
            .await?
            .into_iter()
            .last()
            .ok_or_else(|| MembershipError::no_active_subscription(cmd.user_id.clone()))?;

        // 2. Cancel at the gateway
        let session = self
            .gateway
            .retrieve_checkout_session(&record.checkout_session_id)
            .await?;

        let subscription_id = session.subscription_id.ok_or_else(|| {
            MembershipError::gateway_lookup(format!(
                "checkout session {} has no subscription",
                record.checkout_session_id
            ))
        })?;

        self.gateway.cancel_subscription(&subscription_id).await?;

        // 3. Mirror locally
        let cancelled = self
            .subscriptions
            .update_status(
                &record.checkout_session_id,
                SubscriptionStatus::Active,
                SubscriptionStatus::Cancelled,
            )
            .await?;

        if !cancelled {
            // A concurrent upgrade retired this record and granted a new tier.
            let current = self
                .subscriptions
                .find_by_checkout_session_id(&record.checkout_session_id)
                .await?
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "missing".to_string());

            tracing::warn!(
                user_id = %cmd.user_id,
                checkout_session_id = %record.checkout_session_id,
                status = %current,
                "Record left ACTIVE during cancellation"
            );
            return Err(MembershipError::invalid_state(current, "cancel"));
        }

        self.users.clear_membership_key(&cmd.user_id).await?;

        record
            .transition_to(SubscriptionStatus::Cancelled)
            .map_err(MembershipError::from)?;

        tracing::info!(
            user_id = %cmd.user_id,
            checkout_session_id = %record.checkout_session_id,
            subscription_id = %subscription_id,
            "Subscription cancelled"
        );

        Ok(CancelSubscriptionResult { record })
    }
}
