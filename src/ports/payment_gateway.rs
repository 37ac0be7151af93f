//! Payment gateway port.
//!
//! Pure I/O contract over the external payment gateway (Stripe in
//! production). Implementations hold no business state and never retry;
//! callers decide what a failure means.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::CheckoutSessionId;
use crate::domain::membership::{CheckoutMetadata, MembershipError};

/// Port for the remote payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Resolve a price lookup key (the membership key) to an active price.
    ///
    /// Returns `Ok(None)` when the gateway knows no such price.
    async fn find_price_by_lookup_key(&self, lookup_key: &str)
        -> Result<Option<Price>, PaymentError>;

    /// List active prices as reported by the gateway.
    async fn list_prices(&self) -> Result<Vec<Price>, PaymentError>;

    /// Open a subscription-mode checkout session for a single price.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetch a checkout session by id.
    async fn retrieve_checkout_session(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Fetch a gateway subscription by id.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError>;

    /// Cancel a gateway subscription immediately.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError>;

    /// Verify a webhook signature and decode the event.
    ///
    /// Fails with `InvalidWebhook` when the payload cannot be trusted and
    /// with `InvalidPayload` when a trusted payload does not decode.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// A gateway price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Gateway price id (`price_...`).
    pub id: String,

    /// Lookup key; only prices carrying one are internal membership tiers.
    pub lookup_key: Option<String>,

    /// Unit amount in the smallest currency unit.
    pub unit_amount: Option<i64>,

    /// Lowercase ISO currency code.
    pub currency: String,

    /// Billing interval (`month`, `year`, ...) for recurring prices.
    pub recurring_interval: Option<String>,

    /// Product id the price belongs to.
    pub product: Option<String>,

    pub active: bool,
}

impl Price {
    /// Returns true if the price is an internal membership tier.
    pub fn is_membership_tier(&self) -> bool {
        self.lookup_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Request to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCheckoutRequest {
    /// Price to subscribe to (quantity 1).
    pub price_id: String,

    /// Redirect after successful payment.
    pub success_url: String,

    /// Redirect after an abandoned checkout.
    pub cancel_url: String,

    /// Reconciliation metadata stored on the session.
    pub metadata: CheckoutMetadata,
}

/// Checkout session status as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Open,
    Complete,
    Expired,
    Unknown,
}

impl CheckoutStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "open" => CheckoutStatus::Open,
            "complete" => CheckoutStatus::Complete,
            "expired" => CheckoutStatus::Expired,
            _ => CheckoutStatus::Unknown,
        }
    }
}

/// A gateway checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: CheckoutSessionId,

    /// Hosted payment page; present while the session is open.
    pub url: Option<String>,

    pub status: CheckoutStatus,

    /// Subscription created by the checkout, once completed.
    pub subscription_id: Option<String>,

    /// Raw metadata map; decode with [`CheckoutMetadata::from_map`].
    pub metadata: HashMap<String, String>,
}

/// Subscription status from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewaySubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Trialing,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    Unknown,
}

impl GatewaySubscriptionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => GatewaySubscriptionStatus::Active,
            "past_due" => GatewaySubscriptionStatus::PastDue,
            "canceled" => GatewaySubscriptionStatus::Canceled,
            "trialing" => GatewaySubscriptionStatus::Trialing,
            "incomplete" => GatewaySubscriptionStatus::Incomplete,
            "incomplete_expired" => GatewaySubscriptionStatus::IncompleteExpired,
            "unpaid" => GatewaySubscriptionStatus::Unpaid,
            "paused" => GatewaySubscriptionStatus::Paused,
            _ => GatewaySubscriptionStatus::Unknown,
        }
    }
}

/// A gateway subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: GatewaySubscriptionStatus,

    /// End of the current billing period (Unix seconds).
    pub current_period_end: i64,
}

/// Verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Event id from the gateway (`evt_...`).
    pub id: String,

    pub event_type: WebhookEventType,

    pub data: WebhookEventData,

    /// When the event occurred (Unix seconds).
    pub created_at: i64,
}

/// Webhook event types with meaning here; everything else is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    CheckoutSessionExpired,
    InvoicePaymentFailed,
    SubscriptionDeleted,
    Unknown(String),
}

impl WebhookEventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => WebhookEventType::CheckoutSessionCompleted,
            "checkout.session.expired" => WebhookEventType::CheckoutSessionExpired,
            "invoice.payment_failed" => WebhookEventType::InvoicePaymentFailed,
            "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
            other => WebhookEventType::Unknown(other.to_string()),
        }
    }

    /// Gateway spelling of the event type.
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::CheckoutSessionCompleted => "checkout.session.completed",
            WebhookEventType::CheckoutSessionExpired => "checkout.session.expired",
            WebhookEventType::InvoicePaymentFailed => "invoice.payment_failed",
            WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted",
            WebhookEventType::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventData {
    /// Checkout session object (checkout.session.* events).
    Checkout(CheckoutSession),

    /// Anything else, kept as raw JSON for logging.
    Raw { json: String },
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Gateway's own error code, when it sent one.
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidPayload, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for MembershipError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::NotFound => MembershipError::gateway_lookup(err.message),
            PaymentErrorCode::InvalidWebhook => {
                MembershipError::signature_verification_failed(err.message)
            }
            PaymentErrorCode::InvalidPayload => MembershipError::validation("payload", err.message),
            _ => MembershipError::gateway_unavailable(err.to_string()),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue or timeout.
    NetworkError,

    /// API key rejected.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Webhook signature or timestamp rejected.
    InvalidWebhook,

    /// Signature accepted but the payload does not decode.
    InvalidPayload,

    /// Gateway answered with an error.
    ProviderError,

    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::InvalidPayload => "invalid_payload",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
