//! Axum router configuration for payment endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::{auth_middleware, AuthState};

use super::handlers::{
    cancel_subscription, get_overview, handle_webhook, list_prices, start_checkout,
    PaymentAppState,
};

/// Admin routes; every handler requires a session.
///
/// - `POST /checkout` - Start a checkout for a user
/// - `POST /cancel` - Cancel a user's subscription
/// - `GET /prices` - List membership tiers
/// - `GET /overview?userId=` - Subscription page data
pub fn admin_routes(auth: AuthState) -> Router<PaymentAppState> {
    Router::new()
        .route("/checkout", post(start_checkout))
        .route("/cancel", post(cancel_subscription))
        .route("/prices", get(list_prices))
        .route("/overview", get(get_overview))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
}

/// Gateway callback route, verified by signature instead of session.
///
/// - `POST /webhook`
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

/// The complete payment router, for mounting at `/api/payment`.
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api/payment", payment_router(auth_state))
///     .with_state(payment_state);
/// ```
pub fn payment_router(auth: AuthState) -> Router<PaymentAppState> {
    Router::new()
        .merge(admin_routes(auth))
        .merge(webhook_routes())
}
