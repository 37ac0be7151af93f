//! HTTP adapter for payment endpoints.
//!
//! - `POST /api/payment/checkout` - Start a checkout (session)
//! - `POST /api/payment/cancel` - Cancel the active subscription (session)
//! - `GET /api/payment/prices` - Membership tiers (session)
//! - `GET /api/payment/overview` - Per-user subscription overview (session)
//! - `POST /api/payment/webhook` - Gateway callback (signature)

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{acknowledge, PaymentApiError, PaymentAppState, SIGNATURE_HEADER};
pub use routes::payment_router;
