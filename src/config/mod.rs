//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `MEMBERSHIP_ADMIN`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use membership_admin::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::{PaymentConfig, WebhookAckPolicy};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Session token validation
    pub auth: AuthConfig,

    /// Payment configuration (Stripe)
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `MEMBERSHIP_ADMIN__*` variables:
    ///
    /// - `MEMBERSHIP_ADMIN__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `MEMBERSHIP_ADMIN__PAYMENT__WEBHOOK_ACK_POLICY=reject_unverified`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its field type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBERSHIP_ADMIN")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate()?;
        self.payment.validate(&self.server.environment)?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        (
            "MEMBERSHIP_ADMIN__DATABASE__URL",
            "postgresql://test@localhost/membership",
        ),
        (
            "MEMBERSHIP_ADMIN__AUTH__SESSION_SECRET",
            "0123456789abcdef0123456789abcdef",
        ),
        ("MEMBERSHIP_ADMIN__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("MEMBERSHIP_ADMIN__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        (
            "MEMBERSHIP_ADMIN__PAYMENT__PUBLIC_BASE_URL",
            "https://admin.example.com",
        ),
    ];

    const OPTIONAL: &[&str] = &[
        "MEMBERSHIP_ADMIN__SERVER__PORT",
        "MEMBERSHIP_ADMIN__SERVER__ENVIRONMENT",
        "MEMBERSHIP_ADMIN__PAYMENT__WEBHOOK_ACK_POLICY",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/membership");
        assert_eq!(config.payment.public_base_url, "https://admin.example.com");
        assert_eq!(
            config.payment.webhook_ack_policy,
            WebhookAckPolicy::AlwaysAcknowledge
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("MEMBERSHIP_ADMIN__SERVER__PORT", "3000"),
            ("MEMBERSHIP_ADMIN__SERVER__ENVIRONMENT", "production"),
            (
                "MEMBERSHIP_ADMIN__PAYMENT__WEBHOOK_ACK_POLICY",
                "reject_unverified",
            ),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(
            config.payment.webhook_ack_policy,
            WebhookAckPolicy::RejectUnverified
        );
    }

    #[test]
    fn test_missing_required_section_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        assert!(matches!(AppConfig::load(), Err(ConfigError::LoadError(_))));
    }
}
