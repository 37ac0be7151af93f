//! Mock payment gateway for testing.
//!
//! A configurable in-process stand-in for Stripe. Supports:
//! - A price catalogue
//! - Checkout sessions that can be completed from the test
//! - Subscriptions with cancellation
//! - Error injection per method or once
//! - Call tracking
//! - Webhook verification modes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::CheckoutSessionId;
use crate::ports::{
    CheckoutSession, CheckoutStatus, CreateCheckoutRequest, GatewaySubscription,
    GatewaySubscriptionStatus, PaymentError, PaymentGateway, Price, WebhookEvent,
    WebhookEventData, WebhookEventType,
};

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.add_price(MockPaymentGateway::price("price_gold", "gold"));
///
/// let session = gateway.create_checkout_session(request).await?;
/// let completed = gateway.complete_session(&session.id, "sub_1", period_end);
/// gateway.set_webhook_event(MockPaymentGateway::completed_event("evt_1", completed));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    prices: Vec<Price>,

    sessions: HashMap<String, CheckoutSession>,

    subscriptions: HashMap<String, GatewaySubscription>,

    /// Requests passed to `create_checkout_session`, in order.
    checkout_requests: Vec<CreateCheckoutRequest>,

    next_session_seq: u32,

    /// Event returned by every accepted verification.
    webhook_event: Option<WebhookEvent>,

    /// Error to return on the next call to any method.
    next_error: Option<PaymentError>,

    /// Errors returned by every call to a method.
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,

    webhook_verify_mode: WebhookVerifyMode,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Accept any signature.
    #[default]
    AcceptAll,

    /// Accept only this exact signature header.
    RequireSignature(String),

    /// Reject every signature.
    AlwaysFail,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that rejects every webhook signature.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    /// A mock that accepts only `signature` as a valid signature header.
    pub fn requiring_signature(signature: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::RequireSignature(signature.into());
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    /// An active monthly price carrying `lookup_key`.
    pub fn price(id: &str, lookup_key: &str) -> Price {
        Price {
            id: id.to_string(),
            lookup_key: Some(lookup_key.to_string()),
            unit_amount: Some(1999),
            currency: "usd".to_string(),
            recurring_interval: Some("month".to_string()),
            product: Some(format!("prod_{}", lookup_key)),
            active: true,
        }
    }

    /// A `checkout.session.completed` event for `session`.
    pub fn completed_event(event_id: &str, session: CheckoutSession) -> WebhookEvent {
        WebhookEvent {
            id: event_id.to_string(),
            event_type: WebhookEventType::CheckoutSessionCompleted,
            data: WebhookEventData::Checkout(session),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_price(&self, price: Price) {
        self.state().prices.push(price);
    }

    /// Register a live gateway subscription.
    pub fn add_subscription(&self, subscription_id: &str, current_period_end: i64) {
        self.state().subscriptions.insert(
            subscription_id.to_string(),
            GatewaySubscription {
                id: subscription_id.to_string(),
                status: GatewaySubscriptionStatus::Active,
                current_period_end,
            },
        );
    }

    /// Register a checkout session directly.
    pub fn add_session(&self, session: CheckoutSession) {
        self.state()
            .sessions
            .insert(session.id.to_string(), session);
    }

    /// Mark a session complete, attach a new active subscription to it, and
    /// return the completed session.
    ///
    /// Returns `None` if the session is unknown.
    pub fn complete_session(
        &self,
        session_id: &CheckoutSessionId,
        subscription_id: &str,
        current_period_end: i64,
    ) -> Option<CheckoutSession> {
        self.add_subscription(subscription_id, current_period_end);

        let mut state = self.state();
        let session = state.sessions.get_mut(session_id.as_str())?;
        session.status = CheckoutStatus::Complete;
        session.url = None;
        session.subscription_id = Some(subscription_id.to_string());
        Some(session.clone())
    }

    /// Set the event returned by accepted webhook verifications.
    pub fn set_webhook_event(&self, event: WebhookEvent) {
        self.state().webhook_event = Some(event);
    }

    /// Fail the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Fail every call to `method`.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    /// The most recent checkout request.
    pub fn last_checkout_request(&self) -> Option<CreateCheckoutRequest> {
        self.state().checkout_requests.last().cloned()
    }

    /// Current gateway-side state of a subscription.
    pub fn subscription(&self, subscription_id: &str) -> Option<GatewaySubscription> {
        self.state().subscriptions.get(subscription_id).cloned()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        let mut state = self.state();

        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, PaymentError> {
        self.record_call("find_price_by_lookup_key", vec![lookup_key.to_string()]);
        self.check_error("find_price_by_lookup_key")?;

        Ok(self
            .state()
            .prices
            .iter()
            .find(|p| p.active && p.lookup_key.as_deref() == Some(lookup_key))
            .cloned())
    }

    async fn list_prices(&self) -> Result<Vec<Price>, PaymentError> {
        self.record_call("list_prices", vec![]);
        self.check_error("list_prices")?;

        Ok(self
            .state()
            .prices
            .iter()
            .filter(|p| p.active)
            .cloned()
            .collect())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call(
            "create_checkout_session",
            vec![request.price_id.clone(), request.metadata.user_id.to_string()],
        );
        self.check_error("create_checkout_session")?;

        let mut state = self.state();
        state.next_session_seq += 1;
        let raw_id = format!("cs_mock_{}", state.next_session_seq);
        let id = CheckoutSessionId::new(raw_id.clone())
            .map_err(|e| PaymentError::provider(e.to_string()))?;

        let session = CheckoutSession {
            id,
            url: Some(format!("https://checkout.mock/pay/{}", raw_id)),
            status: CheckoutStatus::Open,
            subscription_id: None,
            metadata: request.metadata.to_map(),
        };

        state.sessions.insert(raw_id, session.clone());
        state.checkout_requests.push(request);

        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record_call("retrieve_checkout_session", vec![session_id.to_string()]);
        self.check_error("retrieve_checkout_session")?;

        self.state()
            .sessions
            .get(session_id.as_str())
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Checkout session"))
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        self.record_call("retrieve_subscription", vec![subscription_id.to_string()]);
        self.check_error("retrieve_subscription")?;

        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Subscription"))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        self.record_call("cancel_subscription", vec![subscription_id.to_string()]);
        self.check_error("cancel_subscription")?;

        let mut state = self.state();
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PaymentError::not_found("Subscription"))?;
        subscription.status = GatewaySubscriptionStatus::Canceled;

        Ok(subscription.clone())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.record_call(
            "verify_webhook",
            vec![payload.len().to_string(), signature.to_string()],
        );
        self.check_error("verify_webhook")?;

        let state = self.state();
        match &state.webhook_verify_mode {
            WebhookVerifyMode::AlwaysFail => {
                return Err(PaymentError::invalid_webhook("Invalid signature"));
            }
            WebhookVerifyMode::RequireSignature(expected) if expected != signature => {
                return Err(PaymentError::invalid_webhook("Invalid signature"));
            }
            _ => {}
        }

        state
            .webhook_event
            .clone()
            .ok_or_else(|| PaymentError::invalid_payload("No webhook event configured"))
    }
}
