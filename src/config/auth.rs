//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Session token settings shared with the account subsystem that issues them.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub session_secret: SecretString,

    /// Expected `iss` claim
    #[serde(default = "default_session_issuer")]
    pub session_issuer: String,
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.session_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__SESSION_SECRET"));
        }
        if secret.len() < 32 {
            return Err(ValidationError::SessionSecretTooShort);
        }
        if self.session_issuer.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__SESSION_ISSUER"));
        }
        Ok(())
    }
}

fn default_session_issuer() -> String {
    "membership-admin".to_string()
}
