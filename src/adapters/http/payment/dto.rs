//! HTTP DTOs (Data Transfer Objects) for payment endpoints.
//!
//! Field names are camelCase to match the admin UI. Every response carries
//! an `ok` flag.

use serde::{Deserialize, Serialize};

use crate::ports::Price;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a checkout for a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: String,
    /// Tier lookup key.
    pub membership: String,
}

/// Request to cancel a user's subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub user_id: String,
}

/// Query string of the overview endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewParams {
    pub user_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for checkout start.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub ok: bool,
    /// Absent when the user already holds the requested tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<CheckoutInfo>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutInfo {
    /// Gateway page the browser is sent to.
    pub url: String,
}

/// Response carrying only a message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// A membership tier as shown to the admin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub id: String,
    pub lookup_key: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub recurring_interval: Option<String>,
    pub product: Option<String>,
}

impl From<Price> for PriceResponse {
    fn from(price: Price) -> Self {
        Self {
            id: price.id,
            lookup_key: price.lookup_key.unwrap_or_default(),
            unit_amount: price.unit_amount,
            currency: price.currency,
            recurring_interval: price.recurring_interval,
            product: price.product,
        }
    }
}

/// Response for the price listing.
#[derive(Debug, Clone, Serialize)]
pub struct PricesResponse {
    pub ok: bool,
    pub prices: Vec<PriceResponse>,
}

/// Response for a user's payment overview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub ok: bool,
    pub prices: Vec<PriceResponse>,
    pub has_subscription: bool,
    /// Empty string when the user has no membership.
    pub membership_key: String,
}

/// Error body for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: code.into(),
            message: message.into(),
        }
    }
}
