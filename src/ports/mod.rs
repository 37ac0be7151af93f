//! Ports - the seams between the application layer and the outside world.
//!
//! - `PaymentGateway` - remote payment gateway (prices, checkout, subscriptions, webhooks)
//! - `SubscriptionStore` - persistence of subscription records
//! - `UserMembershipStore` - the membership fields of a user
//! - `SessionValidator` - session token validation for the HTTP surface

mod payment_gateway;
mod session_validator;
mod subscription_store;
mod user_membership_store;

pub use payment_gateway::{
    CheckoutSession, CheckoutStatus, CreateCheckoutRequest, GatewaySubscription,
    GatewaySubscriptionStatus, PaymentError, PaymentErrorCode, PaymentGateway, Price,
    WebhookEvent, WebhookEventData, WebhookEventType,
};
pub use session_validator::SessionValidator;
pub use subscription_store::SubscriptionStore;
pub use user_membership_store::UserMembershipStore;
