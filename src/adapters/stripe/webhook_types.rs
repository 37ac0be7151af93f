//! Stripe wire types.
//!
//! Serde mirrors of the Stripe objects the gateway adapter reads: the
//! webhook envelope, checkout sessions, subscriptions and prices. Only the
//! fields the membership flows consume are modelled; everything else in the
//! JSON is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::CheckoutSessionId;
use crate::ports::{
    CheckoutSession, CheckoutStatus, GatewaySubscription, GatewaySubscriptionStatus, Price,
};

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty.
    MissingHeader,
    /// A component is not `key=value`.
    MalformedComponent,
    /// No `t=` component.
    MissingTimestamp,
    /// No `v1=` component.
    MissingV1Signature,
    /// `t=` is not an integer.
    InvalidTimestamp,
    /// `v1=` is not hex.
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MalformedComponent => write!(f, "Malformed signature component"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// Stripe sends several `v1` entries while a signing secret is being rolled;
/// any one of them matching is enough.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or(SignatureParseError::MalformedComponent)?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    let sig = hex_decode(value.trim())
                        .ok_or(SignatureParseError::InvalidSignatureFormat)?;
                    v1_signatures.push(sig);
                }
                // v0 and future schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// `evt_...`
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Objects
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// `cs_...`
    pub id: String,

    /// Hosted payment page; null once the session is no longer open.
    pub url: Option<String>,

    /// `open`, `complete` or `expired`.
    pub status: Option<String>,

    /// Expanded objects arrive as maps; only the id is kept.
    #[serde(default, deserialize_with = "expandable_id")]
    pub subscription: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCheckoutSession {
    pub fn into_checkout_session(self) -> Result<CheckoutSession, String> {
        let id = CheckoutSessionId::new(self.id).map_err(|e| e.to_string())?;
        let status = self
            .status
            .as_deref()
            .map(CheckoutStatus::parse)
            .unwrap_or(CheckoutStatus::Unknown);

        Ok(CheckoutSession {
            id,
            url: self.url,
            status,
            subscription_id: self.subscription,
            metadata: self.metadata,
        })
    }
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// `sub_...`
    pub id: String,

    pub status: String,

    pub current_period_end: i64,
}

impl From<StripeSubscription> for GatewaySubscription {
    fn from(sub: StripeSubscription) -> Self {
        GatewaySubscription {
            status: GatewaySubscriptionStatus::parse(&sub.status),
            id: sub.id,
            current_period_end: sub.current_period_end,
        }
    }
}

/// Stripe Price object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    /// `price_...`
    pub id: String,

    pub lookup_key: Option<String>,

    pub unit_amount: Option<i64>,

    pub currency: String,

    pub recurring: Option<StripeRecurring>,

    #[serde(default, deserialize_with = "expandable_id")]
    pub product: Option<String>,

    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRecurring {
    pub interval: String,
}

impl From<StripePrice> for Price {
    fn from(price: StripePrice) -> Self {
        Price {
            id: price.id,
            lookup_key: price.lookup_key,
            unit_amount: price.unit_amount,
            currency: price.currency,
            recurring_interval: price.recurring.map(|r| r.interval),
            product: price.product,
            active: price.active,
        }
    }
}

/// Stripe list envelope for prices.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceList {
    pub data: Vec<StripePrice>,

    #[serde(default)]
    pub has_more: bool,
}

/// Stripe error envelope (`{"error": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorEnvelope {
    pub error: StripeErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
}

/// Accepts either an id string or an expanded object carrying `"id"`.
fn expandable_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Object(map)) => map
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    })
}
