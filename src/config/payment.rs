//! Payment configuration

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// How the webhook endpoint answers outcomes that did not reconcile.
///
/// The gateway redelivers only deliveries it did not see a 2xx for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAckPolicy {
    /// 200 for every decodable delivery, including untrusted and failed ones.
    #[default]
    AlwaysAcknowledge,
    /// 400 for untrusted deliveries and 500 for failed reconciliation, so the
    /// gateway retries.
    RejectUnverified,
}

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    /// Override for the Stripe API host, e.g. a local stripe-mock
    #[serde(default = "default_stripe_api_base_url")]
    pub stripe_api_base_url: String,

    /// Reject webhook events not flagged `livemode`
    #[serde(default)]
    pub require_livemode: bool,

    /// Per-call timeout for Stripe API requests in seconds
    #[serde(default = "default_stripe_request_timeout_secs")]
    pub stripe_request_timeout_secs: u64,

    /// Origin checkout redirects return to when the request has no `Origin` header
    pub public_base_url: String,

    #[serde(default)]
    pub webhook_ack_policy: WebhookAckPolicy,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Stripe API call timeout as a Duration
    pub fn stripe_request_timeout(&self) -> Duration {
        Duration::from_secs(self.stripe_request_timeout_secs)
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.stripe_request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if !is_http_url(&self.stripe_api_base_url) {
            return Err(ValidationError::InvalidUrl("PAYMENT__STRIPE_API_BASE_URL"));
        }
        if self.public_base_url.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PUBLIC_BASE_URL"));
        }
        if !is_http_url(&self.public_base_url) {
            return Err(ValidationError::InvalidUrl("PAYMENT__PUBLIC_BASE_URL"));
        }

        if *environment == Environment::Production {
            if !self.public_base_url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps("PAYMENT__PUBLIC_BASE_URL"));
            }
            if self.is_test_mode() {
                tracing::warn!("Stripe test key configured in production");
            }
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn default_stripe_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_stripe_request_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: SecretString::new("sk_test_abcd1234".to_string()),
            stripe_webhook_secret: SecretString::new("whsec_xyz789".to_string()),
            stripe_api_base_url: default_stripe_api_base_url(),
            require_livemode: false,
            stripe_request_timeout_secs: default_stripe_request_timeout_secs(),
            public_base_url: "https://admin.example.com".to_string(),
            webhook_ack_policy: WebhookAckPolicy::default(),
        }
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate(&Environment::Production).is_ok());
        assert!(valid().is_test_mode());
    }

    #[test]
    fn test_default_policy_always_acknowledges() {
        assert_eq!(WebhookAckPolicy::default(), WebhookAckPolicy::AlwaysAcknowledge);
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: WebhookAckPolicy = serde_json::from_str("\"reject_unverified\"").unwrap();
        assert_eq!(policy, WebhookAckPolicy::RejectUnverified);
    }

    #[test]
    fn test_validation_missing_api_key() {
        let config = PaymentConfig {
            stripe_api_key: SecretString::new(String::new()),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: SecretString::new("pk_test_xxx".to_string()),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: SecretString::new("secret_xxx".to_string()),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_plain_http_origin_only_outside_production() {
        let config = PaymentConfig {
            public_base_url: "http://localhost:3000".to_string(),
            ..valid()
        };
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::MustBeHttps("PAYMENT__PUBLIC_BASE_URL"))
        );
    }

    #[test]
    fn test_validation_rejects_non_url_origin() {
        let config = PaymentConfig {
            public_base_url: "admin.example.com".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidUrl("PAYMENT__PUBLIC_BASE_URL"))
        );
    }

    #[test]
    fn test_validation_rejects_zero_stripe_timeout() {
        let config = PaymentConfig {
            stripe_request_timeout_secs: 0,
            ..valid()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidTimeout)
        );
        assert_eq!(valid().stripe_request_timeout(), Duration::from_secs(10));
    }
}
