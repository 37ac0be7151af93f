//! Shared wiring for payment handler tests.

use std::sync::Arc;

use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryUserMembershipStore};
use crate::adapters::stripe::MockPaymentGateway;
use crate::domain::foundation::{CheckoutSessionId, UserId};
use crate::domain::membership::{SubscriptionRecord, SubscriptionStatus};
use crate::ports::{CheckoutSession, CheckoutStatus, SubscriptionStore};

pub const PERIOD_END: i64 = 1_900_000_000;

pub struct Fixture {
    pub user: UserId,
    pub subscriptions: Arc<InMemorySubscriptionStore>,
    pub users: Arc<InMemoryUserMembershipStore>,
    pub gateway: Arc<MockPaymentGateway>,
}

impl Fixture {
    /// One user (`user-1`) and a gold and a silver tier.
    pub async fn new() -> Self {
        let user = UserId::new("user-1").unwrap();
        let users = Arc::new(InMemoryUserMembershipStore::new());
        users.add_user(user.clone()).await;

        let gateway = Arc::new(MockPaymentGateway::new());
        gateway.add_price(MockPaymentGateway::price("price_gold", "gold"));
        gateway.add_price(MockPaymentGateway::price("price_silver", "silver"));

        Self {
            user,
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            users,
            gateway,
        }
    }

    /// An ACTIVE record backed by a completed session and live subscription
    /// `sub_{checkout_id}`.
    pub async fn seed_active(&self, checkout_id: &str, price_id: &str) -> SubscriptionRecord {
        let checkout = CheckoutSessionId::new(checkout_id).unwrap();
        let mut record =
            SubscriptionRecord::pending(self.user.clone(), checkout.clone(), price_id);
        record.transition_to(SubscriptionStatus::Active).unwrap();
        self.subscriptions.insert(&record).await.unwrap();

        self.gateway.add_session(CheckoutSession {
            id: checkout.clone(),
            url: None,
            status: CheckoutStatus::Complete,
            subscription_id: Some(format!("sub_{}", checkout_id)),
            metadata: Default::default(),
        });
        self.gateway
            .add_subscription(&format!("sub_{}", checkout_id), PERIOD_END);

        record
    }
}
