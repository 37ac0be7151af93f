use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use membership_admin::adapters::auth::JwtSessionValidator;
use membership_admin::adapters::http::{app_router, PaymentAppState};
use membership_admin::adapters::postgres::{PostgresSubscriptionStore, PostgresUserMembershipStore};
use membership_admin::adapters::stripe::{StripeConfig, StripePaymentGateway};
use membership_admin::config::{AppConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    info!("Connected to PostgreSQL");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    let payment = &config.payment;
    let gateway = StripePaymentGateway::new(
        StripeConfig::new(
            payment.stripe_api_key.expose_secret().as_str(),
            payment.stripe_webhook_secret.expose_secret().as_str(),
        )
        .with_base_url(payment.stripe_api_base_url.as_str())
        .with_require_livemode(payment.require_livemode)
        .with_request_timeout(payment.stripe_request_timeout()),
    );

    let state = PaymentAppState {
        subscriptions: Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        users: Arc::new(PostgresUserMembershipStore::new(pool)),
        gateway: Arc::new(gateway),
        webhook_ack_policy: payment.webhook_ack_policy,
        public_base_url: payment.public_base_url.clone(),
    };

    let validator = JwtSessionValidator::new(
        &config.auth.session_secret,
        config.auth.session_issuer.as_str(),
    );

    let app = app_router(state, Arc::new(validator), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        environment = ?config.server.environment,
        webhook_ack_policy = ?payment.webhook_ack_policy,
        stripe_test_mode = payment.is_test_mode(),
        "membership-admin listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

/// JSON lines in production, human-readable output elsewhere. `RUST_LOG`
/// overrides `server.log_level`.
fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
