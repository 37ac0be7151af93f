//! Stripe payment gateway adapter.
//!
//! Implements [`PaymentGateway`] over the Stripe REST API: price lookup,
//! subscription-mode checkout sessions, subscription retrieval and
//! cancellation, and webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) against replays
//! - Secrets held as `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let gateway = StripePaymentGateway::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::CheckoutSessionId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, GatewaySubscription, PaymentError, PaymentErrorCode,
    PaymentGateway, Price, WebhookEvent, WebhookEventData, WebhookEventType,
};

use super::webhook_types::{
    SignatureHeader, StripeCheckoutSession, StripeErrorEnvelope, StripePrice, StripePriceList,
    StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Page size for price listing; Stripe's maximum.
const PRICE_PAGE_LIMIT: &str = "100";

pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Upper bound for a single Stripe API call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_live_...` or `sk_test_...`).
    api_key: SecretString,

    /// Webhook signing secret (`whsec_...`).
    webhook_secret: SecretString,

    api_base_url: String,

    /// Reject test-mode events.
    require_livemode: bool,

    request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            require_livemode: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point at a different API host (stripe-mock, a proxy).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("require_livemode", &self.require_livemode)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Stripe-backed [`PaymentGateway`].
pub struct StripePaymentGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .timeout(self.config.request_timeout)
    }

    /// Send a request and decode a successful JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, PaymentError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::warn!(
                        operation,
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "Stripe request timed out"
                    );
                    PaymentError::network(format!("Stripe {} timed out", operation))
                } else {
                    PaymentError::network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(error_from_response(operation, response).await);
        }

        response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    /// Verify the signature header against the raw payload.
    ///
    /// The signed content is `"{t}.{payload}"`; the payload bytes are used
    /// exactly as received.
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let age = now
            .checked_sub(header.timestamp)
            .ok_or_else(|| PaymentError::invalid_webhook("Invalid timestamp"))?;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay"
            );
            return Err(PaymentError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from the future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_webhook("Event timestamp in future"));
        }

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|e| {
                    PaymentError::new(PaymentErrorCode::Unknown, format!("HMAC init: {}", e))
                })?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        let expected_bytes: &[u8] = expected.as_slice();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| expected_bytes.ct_eq(provided.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!(
                candidates = header.v1_signatures.len(),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Decode a verified payload into a gateway-neutral event.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            PaymentError::invalid_payload(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event"
            );
            return Err(PaymentError::invalid_webhook(
                "Test mode events not allowed",
            ));
        }

        let event_type = WebhookEventType::parse(&stripe_event.event_type);
        let data = extract_event_data(&stripe_event)?;

        Ok(WebhookEvent {
            id: stripe_event.id,
            event_type,
            data,
            created_at: stripe_event.created,
        })
    }
}

fn extract_event_data(event: &StripeWebhookEvent) -> Result<WebhookEventData, PaymentError> {
    if event.event_type.starts_with("checkout.session.") {
        let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
            .map_err(|e| PaymentError::invalid_payload(format!("Invalid checkout session: {}", e)))?;

        let session = session
            .into_checkout_session()
            .map_err(PaymentError::invalid_payload)?;

        return Ok(WebhookEventData::Checkout(session));
    }

    Ok(WebhookEventData::Raw {
        json: event.data.object.to_string(),
    })
}

/// Map a non-success Stripe response onto a [`PaymentError`].
async fn error_from_response(operation: &'static str, response: Response) -> PaymentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (message, provider_code) = match serde_json::from_str::<StripeErrorEnvelope>(&body) {
        Ok(envelope) => (
            envelope.error.message.unwrap_or_else(|| body.clone()),
            envelope.error.code,
        ),
        Err(_) => (body, None),
    };

    tracing::error!(
        operation,
        status = status.as_u16(),
        error = %message,
        "Stripe request failed"
    );

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentErrorCode::AuthenticationError,
        StatusCode::NOT_FOUND => PaymentErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimitExceeded,
        s if s.is_server_error() => PaymentErrorCode::NetworkError,
        _ => PaymentErrorCode::ProviderError,
    };

    let error = PaymentError::new(code, format!("Stripe API error: {}", message));
    match provider_code {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

/// Form parameters for a subscription-mode checkout with one line item.
fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];

    let mut metadata: Vec<_> = request.metadata.to_map().into_iter().collect();
    metadata.sort();
    params.extend(
        metadata
            .into_iter()
            .map(|(key, value)| (format!("metadata[{}]", key), value)),
    );

    params
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, PaymentError> {
        let builder = self
            .http_client
            .get(self.url("/v1/prices"))
            .query(&[("lookup_keys[]", lookup_key), ("active", "true")]);

        let list: StripePriceList = self.send_json("find_price_by_lookup_key", builder).await?;

        Ok(list.data.into_iter().next().map(Price::from))
    }

    async fn list_prices(&self) -> Result<Vec<Price>, PaymentError> {
        let builder = self
            .http_client
            .get(self.url("/v1/prices"))
            .query(&[("active", "true"), ("limit", PRICE_PAGE_LIMIT)]);

        let list: StripePriceList = self.send_json("list_prices", builder).await?;

        if list.has_more {
            tracing::warn!(
                returned = list.data.len(),
                "Price list truncated at one page"
            );
        }

        Ok(list.data.into_iter().map(Price::from).collect())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let builder = self
            .http_client
            .post(self.url("/v1/checkout/sessions"))
            .form(&checkout_params(&request));

        let session: StripeCheckoutSession =
            self.send_json("create_checkout_session", builder).await?;

        let session = session
            .into_checkout_session()
            .map_err(PaymentError::provider)?;

        if session.url.is_none() {
            return Err(PaymentError::provider(
                "Stripe returned a checkout session without a url",
            ));
        }

        tracing::info!(
            checkout_session_id = %session.id,
            price_id = %request.price_id,
            "Checkout session created"
        );

        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/checkout/sessions/{}", session_id)));

        let session: StripeCheckoutSession =
            self.send_json("retrieve_checkout_session", builder).await?;

        session
            .into_checkout_session()
            .map_err(PaymentError::provider)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)));

        let sub: StripeSubscription = self.send_json("retrieve_subscription", builder).await?;

        Ok(sub.into())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        let builder = self
            .http_client
            .delete(self.url(&format!("/v1/subscriptions/{}", subscription_id)));

        let sub: StripeSubscription = self.send_json("cancel_subscription", builder).await?;

        tracing::info!(subscription_id = %sub.id, status = %sub.status, "Subscription canceled");

        Ok(sub.into())
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            PaymentError::invalid_webhook(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let event = self.parse_event(payload)?;

        tracing::debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            "Webhook signature verified"
        );

        Ok(event)
    }
}
