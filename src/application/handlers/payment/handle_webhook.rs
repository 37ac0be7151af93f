//! HandleWebhookHandler - reconciles gateway webhooks into local state.
//!
//! Only `checkout.session.completed` with session status `complete` changes
//! anything. For such an event the handler, in order:
//!
//! 1. grants the user the purchased tier until the subscription's
//!    `current_period_end`
//! 2. moves the checkout's record PENDING → ACTIVE
//! 3. retires every other ACTIVE record of the user (UPGRADED) and cancels
//!    its gateway subscription
//!
//! The new entitlement is written before anything old is retired, so a
//! failure part way through never leaves the user without a membership.
//! Every step is idempotent; a redelivered event converges on the same state.

use std::sync::Arc;

use crate::domain::foundation::{CheckoutSessionId, StateMachine, Timestamp, UserId};
use crate::domain::membership::{CheckoutMetadata, SubscriptionStatus, WebhookError};
use crate::ports::{
    CheckoutSession, CheckoutStatus, PaymentErrorCode, PaymentGateway, SubscriptionStore,
    UserMembershipStore, WebhookEventData, WebhookEventType,
};

/// Command to handle a webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleWebhookCommand {
    /// Raw request body, byte for byte.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: String,
}

/// What a webhook delivery amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Signature or timestamp rejected; nothing was read or written.
    Untrusted { reason: String },

    /// Signature accepted but the payload does not decode.
    Malformed { reason: String },

    /// Nothing to do for this event.
    Ignored { event_type: String },

    /// The checkout's record is ACTIVE and the user holds its tier.
    Reconciled {
        checkout_session_id: CheckoutSessionId,
        user_id: UserId,
        /// Records moved to UPGRADED by this delivery.
        retired: Vec<CheckoutSessionId>,
        /// Retired records whose gateway subscription could not be cancelled.
        unreconciled: Vec<CheckoutSessionId>,
    },

    /// Replay for a checkout already UPGRADED or CANCELLED; nothing written.
    AlreadyRetired { checkout_session_id: CheckoutSessionId },

    /// A gateway or store step failed; redelivery may succeed.
    ReconciliationFailed { reason: String },
}

impl WebhookOutcome {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookOutcome::Untrusted { .. } => "untrusted",
            WebhookOutcome::Malformed { .. } => "malformed",
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::Reconciled { .. } => "reconciled",
            WebhookOutcome::AlreadyRetired { .. } => "already_retired",
            WebhookOutcome::ReconciliationFailed { .. } => "reconciliation_failed",
        }
    }
}

/// Handler for gateway webhooks.
pub struct HandleWebhookHandler {
    subscriptions: Arc<dyn SubscriptionStore>,
    users: Arc<dyn UserMembershipStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl HandleWebhookHandler {
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

    pub async fn handle(&self, cmd: HandleWebhookCommand) -> WebhookOutcome {
        let event = match self.gateway.verify_webhook(&cmd.payload, &cmd.signature).await {
            Ok(event) => event,
            Err(e) if e.code == PaymentErrorCode::InvalidPayload => {
                tracing::warn!(error = %e, "Webhook payload could not be decoded");
                return WebhookOutcome::Malformed { reason: e.message };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Webhook rejected");
                return WebhookOutcome::Untrusted { reason: e.message };
            }
        };

        if event.event_type != WebhookEventType::CheckoutSessionCompleted {
            tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Webhook event ignored"
            );
            return WebhookOutcome::Ignored {
                event_type: event.event_type.to_string(),
            };
        }

        let session = match event.data {
            WebhookEventData::Checkout(session) => session,
            WebhookEventData::Raw { .. } => {
                tracing::warn!(event_id = %event.id, "Completed event without checkout session");
                return WebhookOutcome::Malformed {
                    reason: "checkout.session.completed without a checkout session".to_string(),
                };
            }
        };

        if session.status != CheckoutStatus::Complete {
            tracing::info!(
                event_id = %event.id,
                checkout_session_id = %session.id,
                status = ?session.status,
                "Completed event for a session that is not complete"
            );
            return WebhookOutcome::Ignored {
                event_type: event.event_type.to_string(),
            };
        }

        let checkout_session_id = session.id.clone();
        match self.reconcile(session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    checkout_session_id = %checkout_session_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Webhook reconciliation failed"
                );
                WebhookOutcome::ReconciliationFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn reconcile(&self, session: CheckoutSession) -> Result<WebhookOutcome, WebhookError> {
        // a. Decode metadata
        let metadata = CheckoutMetadata::from_map(&session.metadata)?;
        let checkout_id = session.id;

        // b. Replays of retired checkouts change nothing
        let record = self
            .subscriptions
            .find_by_checkout_session_id(&checkout_id)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        if let Some(record) = &record {
            if record.status.is_terminal() {
                tracing::info!(
                    checkout_session_id = %checkout_id,
                    status = %record.status,
                    "Webhook for retired checkout ignored"
                );
                return Ok(WebhookOutcome::AlreadyRetired {
                    checkout_session_id: checkout_id,
                });
            }
        }

        // c. Period end from the gateway subscription
        let subscription_id = session
            .subscription_id
            .ok_or(WebhookError::MissingField("subscription"))?;

        let subscription = self
            .gateway
            .retrieve_subscription(&subscription_id)
            .await
            .map_err(|e| WebhookError::Gateway(e.to_string()))?;

        let expiry = Timestamp::from_unix_secs(subscription.current_period_end)
            .map_err(|_| WebhookError::MissingField("current_period_end"))?;

        // d. Grant the new tier
        self.users
            .set_membership(&metadata.user_id, &metadata.membership_key, expiry)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        // e. Activate this checkout's record
        match record {
            Some(record) if record.status == SubscriptionStatus::Pending => {
                let activated = self
                    .subscriptions
                    .update_status(
                        &checkout_id,
                        SubscriptionStatus::Pending,
                        SubscriptionStatus::Active,
                    )
                    .await
                    .map_err(|e| WebhookError::Store(e.to_string()))?;

                if !activated {
                    tracing::debug!(
                        checkout_session_id = %checkout_id,
                        "Record left PENDING before activation, concurrent delivery"
                    );
                }
            }
            Some(_) => {}
            None => {
                tracing::warn!(
                    checkout_session_id = %checkout_id,
                    user_id = %metadata.user_id,
                    "No subscription record for completed checkout"
                );
            }
        }

        // f. Retire what this checkout supersedes
        let (retired, unreconciled) = self
            .retire_superseded(&metadata.user_id, &checkout_id, metadata.previous_checkout_id)
            .await?;

        tracing::info!(
            checkout_session_id = %checkout_id,
            user_id = %metadata.user_id,
            membership_key = %metadata.membership_key,
            membership_expiry = %expiry.to_rfc3339(),
            retired = retired.len(),
            unreconciled = unreconciled.len(),
            "Subscription reconciled"
        );

        Ok(WebhookOutcome::Reconciled {
            checkout_session_id: checkout_id,
            user_id: metadata.user_id,
            retired,
            unreconciled,
        })
    }

    /// Move every superseded ACTIVE record to UPGRADED and cancel its
    /// gateway subscription.
    ///
    /// Superseded means the checkout named in the metadata plus any other
    /// ACTIVE record of the user. Returns (retired, unreconciled).
    async fn retire_superseded(
        &self,
        user_id: &UserId,
        current: &CheckoutSessionId,
        previous: Option<CheckoutSessionId>,
    ) -> Result<(Vec<CheckoutSessionId>, Vec<CheckoutSessionId>), WebhookError> {
        let others = self
            .subscriptions
            .find_by_user_and_status(user_id, SubscriptionStatus::Active)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        let mut candidates: Vec<CheckoutSessionId> = previous.into_iter().collect();
        for record in others {
            if !candidates.contains(&record.checkout_session_id) {
                candidates.push(record.checkout_session_id);
            }
        }
        candidates.retain(|id| id != current);

        let mut retired = Vec::new();
        let mut unreconciled = Vec::new();

        for checkout_id in candidates {
            let upgraded = self
                .subscriptions
                .update_status(
                    &checkout_id,
                    SubscriptionStatus::Active,
                    SubscriptionStatus::Upgraded,
                )
                .await
                .map_err(|e| WebhookError::Store(e.to_string()))?;

            if !upgraded {
                continue;
            }
            retired.push(checkout_id.clone());

            if let Err(e) = self.cancel_gateway_subscription(&checkout_id).await {
                tracing::error!(
                    checkout_session_id = %checkout_id,
                    user_id = %user_id,
                    error = %e,
                    "Superseded subscription still live at gateway"
                );
                unreconciled.push(checkout_id);
            }
        }

        Ok((retired, unreconciled))
    }

    async fn cancel_gateway_subscription(
        &self,
        checkout_id: &CheckoutSessionId,
    ) -> Result<(), WebhookError> {
        let session = self
            .gateway
            .retrieve_checkout_session(checkout_id)
            .await
            .map_err(|e| WebhookError::Gateway(e.to_string()))?;

        let subscription_id = session
            .subscription_id
            .ok_or(WebhookError::MissingField("subscription"))?;

        self.gateway
            .cancel_subscription(&subscription_id)
            .await
            .map_err(|e| WebhookError::Gateway(e.to_string()))?;

        tracing::info!(
            checkout_session_id = %checkout_id,
            subscription_id = %subscription_id,
            "Superseded subscription canceled"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::application::handlers::payment::fixtures::{Fixture, PERIOD_END};
    use crate::domain::membership::{MembershipKey, SubscriptionRecord};
    use crate::ports::{GatewaySubscriptionStatus, PaymentError, WebhookEvent};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn handler(fx: &Fixture) -> HandleWebhookHandler {
        HandleWebhookHandler::new(
            fx.subscriptions.clone(),
            fx.users.clone(),
            fx.gateway.clone(),
        )
    }

    fn delivery() -> HandleWebhookCommand {
        HandleWebhookCommand {
            payload: br#"{"id":"evt"}"#.to_vec(),
            signature: "t=1,v1=00".to_string(),
        }
    }

    /// Opens a PENDING checkout for `key`, completes it at the gateway and
    /// queues the completed event.
    async fn complete_checkout(
        fx: &Fixture,
        checkout_id: &str,
        key: &str,
        price_id: &str,
        previous: Option<&str>,
    ) {
        let id = CheckoutSessionId::new(checkout_id).unwrap();
        fx.subscriptions
            .insert(&SubscriptionRecord::pending(fx.user.clone(), id.clone(), price_id))
            .await
            .unwrap();

        let metadata = CheckoutMetadata {
            user_id: fx.user.clone(),
            membership_key: MembershipKey::new(key),
            previous_checkout_id: previous.map(|p| CheckoutSessionId::new(p).unwrap()),
        };
        fx.gateway.add_session(CheckoutSession {
            id: id.clone(),
            url: Some("https://checkout.mock/pay".to_string()),
            status: CheckoutStatus::Open,
            subscription_id: None,
            metadata: metadata.to_map(),
        });
        let completed = fx
            .gateway
            .complete_session(&id, &format!("sub_{}", checkout_id), PERIOD_END)
            .unwrap();
        fx.gateway
            .set_webhook_event(MockPaymentGateway::completed_event("evt_1", completed));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // First Purchase
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn first_purchase_activates_record_and_grants_tier() {
        let fx = Fixture::new().await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", None).await;

        let outcome = handler(&fx).handle(delivery()).await;

        assert_eq!(
            outcome,
            WebhookOutcome::Reconciled {
                checkout_session_id: CheckoutSessionId::new("cs_new").unwrap(),
                user_id: fx.user.clone(),
                retired: vec![],
                unreconciled: vec![],
            }
        );
        assert_eq!(
            fx.subscriptions.status_of("cs_new").await,
            Some(SubscriptionStatus::Active)
        );
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        assert_eq!(user.membership_key.as_str(), "gold");
        assert_eq!(user.membership_expiry.unwrap().unix_secs(), PERIOD_END);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Upgrade
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn upgrade_retires_previous_and_cancels_its_subscription() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_old", "price_silver").await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", Some("cs_old")).await;

        let outcome = handler(&fx).handle(delivery()).await;

        let WebhookOutcome::Reconciled {
            retired,
            unreconciled,
            ..
        } = outcome
        else {
            panic!("expected Reconciled, got {:?}", outcome);
        };
        assert_eq!(retired, vec![CheckoutSessionId::new("cs_old").unwrap()]);
        assert!(unreconciled.is_empty());
        assert_eq!(
            fx.subscriptions.status_of("cs_old").await,
            Some(SubscriptionStatus::Upgraded)
        );
        assert_eq!(
            fx.subscriptions.status_of("cs_new").await,
            Some(SubscriptionStatus::Active)
        );
        assert_eq!(
            fx.gateway.subscription("sub_cs_old").unwrap().status,
            GatewaySubscriptionStatus::Canceled
        );
    }

    #[tokio::test]
    async fn other_active_records_are_retired_without_metadata_pointer() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_stray", "price_silver").await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", None).await;

        handler(&fx).handle(delivery()).await;

        assert_eq!(
            fx.subscriptions.status_of("cs_stray").await,
            Some(SubscriptionStatus::Upgraded)
        );
        let active = fx
            .subscriptions
            .find_by_user_and_status(&fx.user, SubscriptionStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn failed_gateway_cancel_is_reported_not_fatal() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_old", "price_silver").await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", Some("cs_old")).await;
        fx.gateway
            .set_method_error("cancel_subscription", PaymentError::network("timeout"));

        let outcome = handler(&fx).handle(delivery()).await;

        let WebhookOutcome::Reconciled { unreconciled, .. } = outcome else {
            panic!("expected Reconciled, got {:?}", outcome);
        };
        assert_eq!(unreconciled, vec![CheckoutSessionId::new("cs_old").unwrap()]);
        assert_eq!(
            fx.subscriptions.status_of("cs_old").await,
            Some(SubscriptionStatus::Upgraded)
        );
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        assert_eq!(user.membership_key.as_str(), "gold");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Replays and Out-of-Order Delivery
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn replay_of_upgraded_checkout_is_already_retired() {
        let fx = Fixture::new().await;
        fx.seed_active("cs_old", "price_silver").await;
        let mut old_session = fx
            .gateway
            .retrieve_checkout_session(&CheckoutSessionId::new("cs_old").unwrap())
            .await
            .unwrap();
        old_session.metadata = CheckoutMetadata {
            user_id: fx.user.clone(),
            membership_key: MembershipKey::new("silver"),
            previous_checkout_id: None,
        }
        .to_map();

        complete_checkout(&fx, "cs_new", "gold", "price_gold", Some("cs_old")).await;
        handler(&fx).handle(delivery()).await;

        fx.gateway
            .set_webhook_event(MockPaymentGateway::completed_event("evt_old", old_session));
        fx.gateway.clear_calls();

        let outcome = handler(&fx).handle(delivery()).await;

        assert_eq!(
            outcome,
            WebhookOutcome::AlreadyRetired {
                checkout_session_id: CheckoutSessionId::new("cs_old").unwrap()
            }
        );
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        assert_eq!(user.membership_key.as_str(), "gold");
        assert!(!fx.gateway.was_called("retrieve_subscription"));
    }

    #[tokio::test]
    async fn missing_record_still_grants_membership() {
        let fx = Fixture::new().await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", None).await;
        let fresh = Fixture::new().await;
        // Same gateway state, empty store.
        let handler = HandleWebhookHandler::new(
            fresh.subscriptions.clone(),
            fx.users.clone(),
            fx.gateway.clone(),
        );

        let outcome = handler.handle(delivery()).await;

        assert_eq!(outcome.kind(), "reconciled");
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        assert!(user.has_membership());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Rejections and Non-Events
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn bad_signature_is_untrusted_and_touches_nothing() {
        let fx = Fixture::new().await;
        let gateway = Arc::new(MockPaymentGateway::rejecting_webhooks());
        let handler =
            HandleWebhookHandler::new(fx.subscriptions.clone(), fx.users.clone(), gateway);

        let outcome = handler.handle(delivery()).await;

        assert!(matches!(outcome, WebhookOutcome::Untrusted { .. }));
        assert!(fx.subscriptions.all().await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_is_malformed() {
        let fx = Fixture::new().await;
        fx.gateway.set_method_error(
            "verify_webhook",
            PaymentError::invalid_payload("Invalid JSON"),
        );

        let outcome = handler(&fx).handle(delivery()).await;

        assert!(matches!(outcome, WebhookOutcome::Malformed { .. }));
    }

    #[tokio::test]
    async fn other_event_types_are_ignored() {
        let fx = Fixture::new().await;
        fx.gateway.set_webhook_event(WebhookEvent {
            id: "evt_2".to_string(),
            event_type: WebhookEventType::InvoicePaymentFailed,
            data: WebhookEventData::Raw {
                json: "{}".to_string(),
            },
            created_at: 0,
        });

        let outcome = handler(&fx).handle(delivery()).await;

        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "invoice.payment_failed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn incomplete_session_is_ignored() {
        let fx = Fixture::new().await;
        fx.gateway.set_webhook_event(MockPaymentGateway::completed_event(
            "evt_3",
            CheckoutSession {
                id: CheckoutSessionId::new("cs_open").unwrap(),
                url: None,
                status: CheckoutStatus::Open,
                subscription_id: None,
                metadata: HashMap::new(),
            },
        ));

        let outcome = handler(&fx).handle(delivery()).await;

        assert_eq!(outcome.kind(), "ignored");
    }

    #[tokio::test]
    async fn missing_metadata_fails_reconciliation() {
        let fx = Fixture::new().await;
        fx.gateway.set_webhook_event(MockPaymentGateway::completed_event(
            "evt_4",
            CheckoutSession {
                id: CheckoutSessionId::new("cs_bare").unwrap(),
                url: None,
                status: CheckoutStatus::Complete,
                subscription_id: Some("sub_bare".to_string()),
                metadata: HashMap::new(),
            },
        ));

        let outcome = handler(&fx).handle(delivery()).await;

        assert!(matches!(
            outcome,
            WebhookOutcome::ReconciliationFailed { .. }
        ));
    }

    #[tokio::test]
    async fn subscription_lookup_failure_fails_before_any_write() {
        let fx = Fixture::new().await;
        complete_checkout(&fx, "cs_new", "gold", "price_gold", None).await;
        fx.gateway
            .set_method_error("retrieve_subscription", PaymentError::network("timeout"));

        let outcome = handler(&fx).handle(delivery()).await;

        assert_eq!(outcome.kind(), "reconciliation_failed");
        assert_eq!(
            fx.subscriptions.status_of("cs_new").await,
            Some(SubscriptionStatus::Pending)
        );
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        assert!(!user.has_membership());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Property Tests
    // ════════════════════════════════════════════════════════════════════════════

    async fn snapshot(fx: &Fixture) -> (Vec<(String, SubscriptionStatus)>, String) {
        let records = fx
            .subscriptions
            .all()
            .await
            .into_iter()
            .map(|r| (r.checkout_session_id.to_string(), r.status))
            .collect();
        let user = fx.users.find(&fx.user).await.unwrap().unwrap();
        (records, user.membership_key.to_string())
    }

    proptest! {
        #[test]
        fn redelivery_converges_to_single_delivery_state(
            deliveries in 1usize..5,
            has_previous in any::<bool>(),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let fx = Fixture::new().await;
                if has_previous {
                    fx.seed_active("cs_old", "price_silver").await;
                }
                let previous = has_previous.then_some("cs_old");
                complete_checkout(&fx, "cs_new", "gold", "price_gold", previous).await;

                handler(&fx).handle(delivery()).await;
                let once = snapshot(&fx).await;

                for _ in 1..deliveries {
                    handler(&fx).handle(delivery()).await;
                }
                let many = snapshot(&fx).await;

                prop_assert_eq!(&once, &many);
                let active = many
                    .0
                    .iter()
                    .filter(|(_, status)| *status == SubscriptionStatus::Active)
                    .count();
                prop_assert_eq!(active, 1);
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
