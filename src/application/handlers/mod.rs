//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod payment;

pub use payment::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    GetPaymentOverviewHandler, GetPaymentOverviewQuery, GetPaymentOverviewResult,
    HandleWebhookCommand, HandleWebhookHandler, ListPricesHandler, ListPricesQuery,
    ListPricesResult, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
    WebhookOutcome,
};
