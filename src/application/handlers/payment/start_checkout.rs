//! StartCheckoutHandler - opens a gateway checkout for a membership tier.

use std::sync::Arc;

use crate::domain::foundation::{CheckoutSessionId, UserId};
use crate::domain::membership::{
    CheckoutMetadata, MembershipError, MembershipKey, SubscriptionRecord, SubscriptionStatus,
};
use crate::ports::{CreateCheckoutRequest, PaymentGateway, SubscriptionStore, UserMembershipStore};

/// Command to start a checkout.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user_id: UserId,
    /// Tier to subscribe to; also the gateway price lookup key.
    pub membership_key: MembershipKey,
    /// Origin the gateway redirects back to, without trailing slash.
    pub return_origin: String,
}

/// Result of starting a checkout.
#[derive(Debug, Clone)]
pub enum StartCheckoutResult {
    /// A checkout session was opened and a PENDING record written.
    CheckoutCreated {
        checkout_url: String,
        checkout_session_id: CheckoutSessionId,
        record: SubscriptionRecord,
    },
    /// The user's ACTIVE record is already for this price.
    AlreadySubscribed { record: SubscriptionRecord },
}

/// Handler for starting a subscription checkout.
pub struct StartCheckoutHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    users: Arc<dyn UserMembershipStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl StartCheckoutHandler {
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
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, MembershipError> {
        if !cmd.membership_key.is_member() {
            return Err(MembershipError::validation(
                "membership",
                "membership must not be empty",
            ));
        }

        // 1. User must exist
        self.users
            .find(&cmd.user_id)
            .await?
            .ok_or_else(|| MembershipError::user_not_found(cmd.user_id.clone()))?;

        // 2. Resolve tier to price
        let price = self
            .gateway
            .find_price_by_lookup_key(cmd.membership_key.as_str())
            .await?
            .ok_or_else(|| MembershipError::gateway_lookup(cmd.membership_key.to_string()))?;

        // 3. Current entitlement: the newest ACTIVE record
        let current = self
            .subscriptions
            .find_by_user_and_status(&cmd.user_id, SubscriptionStatus::Active)
            .await?
            .into_iter()
            .last();

        // 4. Same tier: nothing to do
        if let Some(record) = current.as_ref().filter(|r| r.is_for_price(&price.id)) {
            tracing::info!(
                user_id = %cmd.user_id,
                price_id = %price.id,
                "Checkout skipped, user already subscribed to this price"
            );
            return Ok(StartCheckoutResult::AlreadySubscribed {
                record: record.clone(),
            });
        }

        // 5. Open the checkout session
        let origin = cmd.return_origin.trim_end_matches('/');
        let success_url = format!(
            "{}/users/user-edit/subscription?user={}",
            origin, cmd.user_id
        );
        let cancel_url = format!("{}&cancel=true", success_url);

        let metadata = CheckoutMetadata {
            user_id: cmd.user_id.clone(),
            membership_key: cmd.membership_key.clone(),
            previous_checkout_id: current.map(|r| r.checkout_session_id),
        };

        let session = self
            .gateway
            .create_checkout_session(CreateCheckoutRequest {
                price_id: price.id.clone(),
                success_url,
                cancel_url,
                metadata,
            })
            .await?;

        let checkout_url = session.url.clone().ok_or_else(|| {
            MembershipError::gateway_unavailable("checkout session has no url")
        })?;

        // 6. Record the attempt
        let record = SubscriptionRecord::pending(
            cmd.user_id.clone(),
            session.id.clone(),
            price.id.clone(),
        );

        if let Err(e) = self.subscriptions.insert(&record).await {
            // The open session expires unused at the gateway.
            tracing::warn!(
                user_id = %cmd.user_id,
                checkout_session_id = %session.id,
                error = %e,
                "Checkout session opened but PENDING record not written"
            );
            return Err(e.into());
        }

        tracing::info!(
            user_id = %cmd.user_id,
            checkout_session_id = %session.id,
            price_id = %price.id,
            membership_key = %cmd.membership_key,
            "Checkout started"
        );

        Ok(StartCheckoutResult::CheckoutCreated {
            checkout_url,
            checkout_session_id: session.id,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::payment::fixtures::Fixture;
    use crate::ports::PaymentError;

    fn command(fx: &Fixture, key: &str) -> StartCheckoutCommand {
        StartCheckoutCommand {
            user_id: fx.user.clone(),
            membership_key: MembershipKey::new(key),
            return_origin: "https://admin.example.com/".to_string(),
        }
    }

    fn handler(fx: &Fixture) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            fx.subscriptions.clone(),
            fx.users.clone(),
            fx.gateway.clone(),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_session_and_pending_record() {
        let fx = Fixture::new().await;

        let result = handler(&fx).handle(command(&fx, "gold")).await.unwrap();

        let StartCheckoutResult::CheckoutCreated {
            checkout_url,
            checkout_session_id,
            record,
        } = result
        else {
            panic!("expected CheckoutCreated");
        };
        assert!(checkout_url.starts_with("https://checkout.mock/"));
        assert_eq!(record.status, SubscriptionStatus::Pending);
        assert_eq!(record.price_id, "price_gold");
        assert_eq!(
            fx.subscriptions.status_of(checkout_session_id.as_str()).await,
            Some(SubscriptionStatus::Pending)
        );
    }

    #[tokio::test]
    async fn redirect_urls_point_back_to_user_page() {
        let fx = Fixture::new().await;

        handler(&fx).handle(command(&fx, "gold")).await.unwrap();

        let request = fx.gateway.last_checkout_request().unwrap();
        assert_eq!(
            request.success_url,
            "https://admin.example.com/users/user-edit/subscription?user=user-1"
        );
        assert_eq!(
            request.cancel_url,
            "https://admin.example.com/users/user-edit/subscription?user=user-1&cancel=true"
        );
        assert!(request.metadata.previous_checkout_id.is_none());
    }

    #[tokio::test]
    async fn upgrade_carries_previous_checkout_id() {
        let fx = Fixture::new().await;
        let active = fx.seed_active("cs_prev", "price_silver").await;

        handler(&fx).handle(command(&fx, "gold")).await.unwrap();

        let request = fx.gateway.last_checkout_request().unwrap();
        assert_eq!(
            request.metadata.previous_checkout_id,
            Some(active.checkout_session_id)
        );
        // Current entitlement untouched until the webhook confirms payment.
        assert_eq!(
            fx.subscriptions.status_of("cs_prev").await,
            Some(SubscriptionStatus::Active)
        );
    }

    #[tokio::test]
    async fn newest_active_record_is_the_one_superseded() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_old", "price_gold").await;
        fx.seed_active("cs_new", "price_silver").await;

        let result = handler(&fx).handle(command(&fx, "gold")).await.unwrap();

        assert!(matches!(result, StartCheckoutResult::CheckoutCreated { .. }));
        let request = fx.gateway.last_checkout_request().unwrap();
        assert_eq!(
            request.metadata.previous_checkout_id.as_ref().map(|id| id.as_str()),
            Some("cs_new")
        );
    }

    #[tokio::test]
    async fn same_price_is_already_subscribed() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_prev", "price_gold").await;

        let result = handler(&fx).handle(command(&fx, "gold")).await.unwrap();

        assert!(matches!(
            result,
            StartCheckoutResult::AlreadySubscribed { .. }
        ));
        assert!(!fx.gateway.was_called("create_checkout_session"));
        assert_eq!(fx.subscriptions.all().await.len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Cases
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_user_is_rejected_before_gateway() {
        let fx = Fixture::new().await;
        let mut cmd = command(&fx, "gold");
        cmd.user_id = UserId::new("ghost").unwrap();

        let err = handler(&fx).handle(cmd).await.unwrap_err();

        assert!(matches!(err, MembershipError::UserNotFound(_)));
        assert!(fx.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tier_is_lookup_error() {
        let fx = Fixture::new().await;

        let err = handler(&fx)
            .handle(command(&fx, "platinum"))
            .await
            .unwrap_err();

        assert!(matches!(err, MembershipError::GatewayLookupError(_)));
        assert!(fx.subscriptions.all().await.is_empty());
    }

    #[tokio::test]
    async fn empty_tier_is_validation_error() {
        let fx = Fixture::new().await;

        let err = handler(&fx).handle(command(&fx, "  ")).await.unwrap_err();

        assert!(matches!(err, MembershipError::ValidationFailed { .. }));
    }

    #[tokio::test]
    async fn gateway_outage_writes_nothing() {
        let fx = Fixture::new().await;
        fx.gateway.set_method_error(
            "create_checkout_session",
            PaymentError::network("connection refused"),
        );

        let err = handler(&fx).handle(command(&fx, "gold")).await.unwrap_err();

        assert!(matches!(err, MembershipError::GatewayUnavailable(_)));
        assert_eq!(err.message(), "Something went wrong.");
        assert!(fx.subscriptions.all().await.is_empty());
    }

    #[tokio::test]
    async fn store_failure_on_insert_is_store_unavailable() {
        let fx = Fixture::new().await;
        fx.subscriptions.fail_writes(true);

        let err = handler(&fx).handle(command(&fx, "gold")).await.unwrap_err();

        assert!(matches!(err, MembershipError::StoreUnavailable(_)));
    }
}
