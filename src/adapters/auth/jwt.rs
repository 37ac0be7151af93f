//! HS256 session token validator.
//!
//! Session tokens are issued by the account subsystem and signed with a
//! shared secret. This adapter checks signature, issuer and expiry, then maps
//! the claims onto an [`AuthenticatedUser`].

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Claims carried by a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - the user id.
    pub sub: String,

    pub iss: String,

    /// Expiry (Unix seconds).
    pub exp: i64,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<String>,
}

/// Validates HS256-signed session tokens.
pub struct JwtSessionValidator {
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtSessionValidator {
    pub fn new(secret: &SecretString, issuer: impl Into<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            issuer: issuer.into(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Session token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in session token");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!(error = %e, "Session token rejected");
                    AuthError::InvalidToken
                }
            })?;

        let claims = data.claims;
        let user_id = UserId::new(claims.sub).map_err(|_| {
            tracing::warn!("Session token has a blank subject");
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(user_id, claims.email, claims.role))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "session-secret-for-tests";
    const ISSUER: &str = "membership-accounts";

    fn validator() -> JwtSessionValidator {
        JwtSessionValidator::new(&SecretString::new(SECRET.to_string()), ISSUER)
    }

    fn token(secret: &str, issuer: &str, sub: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: sub.to_string(),
            iss: issuer.to_string(),
            exp: now + exp_offset,
            iat: Some(now),
            email: Some("admin@example.com".to_string()),
            role: Some("admin".to_string()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let user = validator()
            .validate(&token(SECRET, ISSUER, "admin-1", 3600))
            .await
            .unwrap();

        assert_eq!(user.id.as_str(), "admin-1");
        assert_eq!(user.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let err = validator()
            .validate(&token(SECRET, ISSUER, "admin-1", -3600))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::TokenExpired);
    }

    #[tokio::test]
    async fn rejects_wrong_issuer() {
        let err = validator()
            .validate(&token(SECRET, "someone-else", "admin-1", 3600))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let err = validator()
            .validate(&token("another-secret", ISSUER, "admin-1", 3600))
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn rejects_garbage() {
        assert_eq!(
            validator().validate("not.a.jwt").await.unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
