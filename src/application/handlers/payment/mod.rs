//! Payment handlers.
//!
//! Command and query handlers for the paid-membership lifecycle:
//!
//! ## Commands
//! - Starting a gateway checkout for a tier
//! - Reconciling gateway webhooks into local state
//! - Cancelling the active subscription
//!
//! ## Queries
//! - Listing the tiers on offer
//! - The per-user payment overview

mod cancel_subscription;
mod get_payment_overview;
mod handle_webhook;
mod list_prices;
mod start_checkout;

#[cfg(test)]
pub(crate) mod fixtures;

// Commands
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use handle_webhook::{HandleWebhookCommand, HandleWebhookHandler, WebhookOutcome};
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult};

// Queries
pub use get_payment_overview::{
    GetPaymentOverviewHandler, GetPaymentOverviewQuery, GetPaymentOverviewResult,
};
pub use list_prices::{ListPricesHandler, ListPricesQuery, ListPricesResult};
