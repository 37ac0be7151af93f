//! Membership domain - paid subscriptions reconciled against the payment gateway.
//!
//! A user's entitlement is the pair (`membership_key`, `membership_expiry`)
//! on the user. Each checkout attempt leaves a [`SubscriptionRecord`]; at
//! most one of a user's records is ACTIVE once reconciliation settles.

mod checkout_metadata;
mod errors;
mod membership_key;
mod record;
mod status;
mod webhook_errors;

pub use checkout_metadata::CheckoutMetadata;
pub use errors::MembershipError;
pub use membership_key::MembershipKey;
pub use record::{SubscriptionRecord, UserMembership};
pub use status::SubscriptionStatus;
pub use webhook_errors::WebhookError;
