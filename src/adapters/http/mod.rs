//! HTTP adapters - REST API implementations.
//!
//! `app_router` assembles the payment routes, the health probe and the
//! tower-http layers into the service `main` serves.

pub mod middleware;
pub mod payment;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use middleware::{AuthState, RequireAuth};
pub use payment::{payment_router, PaymentAppState};

/// Build the full application router.
pub fn app_router(state: PaymentAppState, auth: AuthState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/payment", payment_router(auth))
        .with_state(state)
        .layer(cors_layer(&server.cors_origins_list()))
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "status": "healthy" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::adapters::auth::MockSessionValidator;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryUserMembershipStore};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::config::WebhookAckPolicy;

    fn app() -> Router {
        let state = PaymentAppState {
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            users: Arc::new(InMemoryUserMembershipStore::new()),
            gateway: Arc::new(MockPaymentGateway::new()),
            webhook_ack_policy: WebhookAckPolicy::default(),
            public_base_url: "https://admin.example.com".to_string(),
        };
        app_router(
            state,
            Arc::new(MockSessionValidator::new()),
            &ServerConfig::default(),
        )
    }

    #[tokio::test]
    async fn health_needs_no_session() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn admin_routes_reject_anonymous_requests() {
        let response = app()
            .oneshot(
                Request::get("/api/payment/prices")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn bad_cors_origin_is_skipped() {
        // Must not panic on a header-invalid origin.
        let _ = cors_layer(&["https://ok.example.com".to_string(), "bad\norigin".to_string()]);
    }
}
