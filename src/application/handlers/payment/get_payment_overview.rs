//! GetPaymentOverviewHandler - Query handler for a user's subscription page.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::{MembershipError, MembershipKey};
use crate::ports::{PaymentGateway, Price, SubscriptionStore, UserMembershipStore};

/// Query for the subscription page of one user.
#[derive(Debug, Clone)]
pub struct GetPaymentOverviewQuery {
    pub user_id: UserId,
}

/// What the subscription page needs to render.
#[derive(Debug, Clone)]
pub struct GetPaymentOverviewResult {
    /// Membership tiers on offer.
    pub prices: Vec<Price>,
    /// True once the user has started any checkout, whatever its outcome.
    pub has_subscription: bool,
    /// The user's current tier; empty when none.
    pub membership_key: MembershipKey,
}

/// Handler for the payment overview.
pub struct GetPaymentOverviewHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    users: Arc<dyn UserMembershipStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl GetPaymentOverviewHandler {
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
        query: GetPaymentOverviewQuery,
    ) -> Result<GetPaymentOverviewResult, MembershipError> {
        let user = self
            .users
            .find(&query.user_id)
            .await?
            .ok_or_else(|| MembershipError::user_not_found(query.user_id.clone()))?;

        let has_subscription = self.subscriptions.has_any_for_user(&query.user_id).await?;

        let prices = self
            .gateway
            .list_prices()
            .await?
            .into_iter()
            .filter(Price::is_membership_tier)
            .collect();

        Ok(GetPaymentOverviewResult {
            prices,
            has_subscription,
            membership_key: user.membership_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::payment::fixtures::{Fixture, PERIOD_END};
    use crate::domain::foundation::Timestamp;

    fn handler(fx: &Fixture) -> GetPaymentOverviewHandler {
        GetPaymentOverviewHandler::new(
            fx.subscriptions.clone(),
            fx.users.clone(),
            fx.gateway.clone(),
        )
    }

    fn query(fx: &Fixture) -> GetPaymentOverviewQuery {
        GetPaymentOverviewQuery {
            user_id: fx.user.clone(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn new_user_has_prices_and_nothing_else() {
        let fx = Fixture::new().await;

        let overview = handler(&fx).handle(query(&fx)).await.unwrap();

        assert_eq!(overview.prices.len(), 2);
        assert!(!overview.has_subscription);
        assert!(!overview.membership_key.is_member());
    }

    #[tokio::test]
    async fn member_sees_current_key() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_1", "price_gold").await;
        fx.users
            .set_membership(
                &fx.user,
                &MembershipKey::new("gold"),
                Timestamp::from_unix_secs(PERIOD_END).unwrap(),
            )
            .await
            .unwrap();

        let overview = handler(&fx).handle(query(&fx)).await.unwrap();

        assert!(overview.has_subscription);
        assert_eq!(overview.membership_key.as_str(), "gold");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let fx = Fixture::new().await;

        let err = handler(&fx)
            .handle(GetPaymentOverviewQuery {
                user_id: UserId::new("ghost").unwrap(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn store_outage_is_store_unavailable() {
        let fx = Fixture::new().await;
        fx.subscriptions.fail_reads(true);

        let err = handler(&fx).handle(query(&fx)).await.unwrap_err();

        assert!(matches!(err, MembershipError::StoreUnavailable(_)));
    }
}
