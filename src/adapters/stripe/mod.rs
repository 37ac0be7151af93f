//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the Stripe REST API:
//! - Price lookup by lookup key
//! - Subscription-mode checkout sessions
//! - Subscription retrieval and cancellation
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated against replays (5-minute window)
//! - Secrets are held as `secrecy::SecretString`

mod mock_payment_gateway;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_adapter::{StripeConfig, StripePaymentGateway, DEFAULT_API_BASE_URL};
pub use webhook_types::{
    hex_encode, SignatureHeader, SignatureParseError, StripeCheckoutSession, StripePrice,
    StripeSubscription, StripeWebhookEvent,
};
