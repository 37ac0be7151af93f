//! HTTP handlers for payment endpoints.
//!
//! These handlers connect Axum routes to the payment command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::payment::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, GetPaymentOverviewHandler,
    GetPaymentOverviewQuery, HandleWebhookCommand, HandleWebhookHandler, ListPricesHandler,
    ListPricesQuery, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
    WebhookOutcome,
};
use crate::config::WebhookAckPolicy;
use crate::domain::foundation::{UserId, ValidationError};
use crate::domain::membership::{MembershipError, MembershipKey};
use crate::ports::{PaymentGateway, SubscriptionStore, UserMembershipStore};

use super::dto::{
    AckResponse, CancelRequest, CheckoutInfo, CheckoutRequest, CheckoutResponse, ErrorResponse,
    MessageResponse, OverviewParams, OverviewResponse, PriceResponse, PricesResponse,
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub const CHECKOUT_CREATED_MESSAGE: &str = "Subscription added successfully.";
pub const ALREADY_SUBSCRIBED_MESSAGE: &str = "User already has a membership.";
pub const CANCELLED_MESSAGE: &str = "Subscription canceled successfully.";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the payment routes.
///
/// Cloned per request; handlers are built on demand from the ports.
#[derive(Clone)]
pub struct PaymentAppState {
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub users: Arc<dyn UserMembershipStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub webhook_ack_policy: WebhookAckPolicy,
    /// Redirect origin when the request carries no `Origin` header.
    pub public_base_url: String,
}

impl PaymentAppState {
    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.subscriptions.clone(),
            self.users.clone(),
            self.gateway.clone(),
        )
    }

    pub fn webhook_handler(&self) -> HandleWebhookHandler {
        HandleWebhookHandler::new(
            self.subscriptions.clone(),
            self.users.clone(),
            self.gateway.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.subscriptions.clone(),
            self.users.clone(),
            self.gateway.clone(),
        )
    }

    pub fn list_prices_handler(&self) -> ListPricesHandler {
        ListPricesHandler::new(self.gateway.clone())
    }

    pub fn overview_handler(&self) -> GetPaymentOverviewHandler {
        GetPaymentOverviewHandler::new(
            self.subscriptions.clone(),
            self.users.clone(),
            self.gateway.clone(),
        )
    }

    fn return_origin(&self, headers: &HeaderMap) -> String {
        headers
            .get("Origin")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && *v != "null")
            .unwrap_or(&self.public_base_url)
            .to_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payment/checkout - Open a checkout for a user
pub async fn start_checkout(
    State(state): State<PaymentAppState>,
    RequireAuth(admin): RequireAuth,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = StartCheckoutCommand {
        user_id: UserId::new(request.user_id)?,
        membership_key: MembershipKey::new(request.membership),
        return_origin: state.return_origin(&headers),
    };

    tracing::debug!(admin_id = %admin.id, user_id = %cmd.user_id, "Checkout requested");

    let response = match state.start_checkout_handler().handle(cmd).await? {
        StartCheckoutResult::CheckoutCreated { checkout_url, .. } => CheckoutResponse {
            ok: true,
            info: Some(CheckoutInfo { url: checkout_url }),
            message: CHECKOUT_CREATED_MESSAGE.to_string(),
        },
        StartCheckoutResult::AlreadySubscribed { .. } => CheckoutResponse {
            ok: true,
            info: None,
            message: ALREADY_SUBSCRIBED_MESSAGE.to_string(),
        },
    };

    Ok(Json(response))
}

/// POST /api/payment/cancel - Cancel a user's active subscription
pub async fn cancel_subscription(
    State(state): State<PaymentAppState>,
    RequireAuth(admin): RequireAuth,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = CancelSubscriptionCommand {
        user_id: UserId::new(request.user_id)?,
    };

    tracing::debug!(admin_id = %admin.id, user_id = %cmd.user_id, "Cancellation requested");

    state.cancel_subscription_handler().handle(cmd).await?;

    Ok(Json(MessageResponse::ok(CANCELLED_MESSAGE)))
}

/// POST /api/payment/webhook - Gateway callback, authenticated by signature
///
/// The body is taken as raw bytes; re-serializing it would break the signature.
pub async fn handle_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // An absent or unreadable header fails verification like a forged one.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state
        .webhook_handler()
        .handle(HandleWebhookCommand {
            payload: body.to_vec(),
            signature: signature.to_string(),
        })
        .await;

    acknowledge(&outcome, state.webhook_ack_policy)
}

/// Maps a webhook outcome to the response the gateway sees.
pub fn acknowledge(outcome: &WebhookOutcome, policy: WebhookAckPolicy) -> Response {
    let ack = || (StatusCode::OK, Json(AckResponse { ok: true })).into_response();

    match (outcome, policy) {
        (WebhookOutcome::Malformed { reason }, _) => {
            PaymentApiError(MembershipError::validation("payload", reason.clone())).into_response()
        }
        (WebhookOutcome::Untrusted { reason }, WebhookAckPolicy::RejectUnverified) => {
            PaymentApiError(MembershipError::signature_verification_failed(reason.clone()))
                .into_response()
        }
        (WebhookOutcome::ReconciliationFailed { .. }, WebhookAckPolicy::RejectUnverified) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "RECONCILIATION_FAILED",
                "Something went wrong.",
            )),
        )
            .into_response(),
        _ => ack(),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/payment/prices - Membership tiers on offer
pub async fn list_prices(
    State(state): State<PaymentAppState>,
    RequireAuth(_admin): RequireAuth,
) -> Result<impl IntoResponse, PaymentApiError> {
    let result = state.list_prices_handler().handle(ListPricesQuery).await?;

    Ok(Json(PricesResponse {
        ok: true,
        prices: result.prices.into_iter().map(PriceResponse::from).collect(),
    }))
}

/// GET /api/payment/overview?userId= - Subscription page data for a user
pub async fn get_overview(
    State(state): State<PaymentAppState>,
    RequireAuth(_admin): RequireAuth,
    Query(params): Query<OverviewParams>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let query = GetPaymentOverviewQuery {
        user_id: UserId::new(params.user_id)?,
    };

    let result = state.overview_handler().handle(query).await?;

    Ok(Json(OverviewResponse {
        ok: true,
        prices: result.prices.into_iter().map(PriceResponse::from).collect(),
        has_subscription: result.has_subscription,
        membership_key: result.membership_key.to_string(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct PaymentApiError(pub MembershipError);

impl From<MembershipError> for PaymentApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for PaymentApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl PaymentApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MembershipError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            MembershipError::UserNotFound(_) | MembershipError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MembershipError::GatewayLookupError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MembershipError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            MembershipError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MembershipError::NoActiveSubscription(_) | MembershipError::InvalidState { .. } => {
                StatusCode::CONFLICT
            }
            MembershipError::SignatureVerificationFailed(_)
            | MembershipError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = %self.0.code(), detail = %self.0.detail(), "Payment request failed");
        } else {
            tracing::debug!(code = %self.0.code(), detail = %self.0.detail(), "Payment request rejected");
        }

        let body = ErrorResponse::new(self.0.code().to_string(), self.0.message());
        (status, Json(body)).into_response()
    }
}
