//! Metadata carried on a gateway checkout session.
//!
//! The checkout session is the only thing that travels from the initiator to
//! the webhook, so everything reconciliation needs rides in its metadata map.

use std::collections::HashMap;

use super::MembershipKey;
use crate::domain::foundation::{CheckoutSessionId, UserId};

use super::WebhookError;

const USER_KEY: &str = "user";
const LOOKUP_KEY: &str = "lookupKey";
const PREVIOUS_CHECKOUT_KEY: &str = "prevCheckoutId";

/// Typed view of checkout session metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: UserId,
    pub membership_key: MembershipKey,
    /// Checkout session of the ACTIVE record this checkout supersedes.
    pub previous_checkout_id: Option<CheckoutSessionId>,
}

impl CheckoutMetadata {
    /// Encodes into the flat string map the gateway stores.
    ///
    /// An absent previous checkout is written as an empty string so the key
    /// is always present.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(USER_KEY.to_string(), self.user_id.to_string());
        map.insert(LOOKUP_KEY.to_string(), self.membership_key.to_string());
        map.insert(
            PREVIOUS_CHECKOUT_KEY.to_string(),
            self.previous_checkout_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_default(),
        );
        map
    }

    /// Decodes gateway metadata, failing on missing or empty required keys.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, WebhookError> {
        let user_id = map
            .get(USER_KEY)
            .and_then(|v| UserId::new(v.as_str()).ok())
            .ok_or(WebhookError::MissingMetadata(USER_KEY))?;

        let membership_key = map
            .get(LOOKUP_KEY)
            .map(|v| MembershipKey::new(v.as_str()))
            .filter(MembershipKey::is_member)
            .ok_or(WebhookError::MissingMetadata(LOOKUP_KEY))?;

        let previous_checkout_id = map
            .get(PREVIOUS_CHECKOUT_KEY)
            .and_then(|v| CheckoutSessionId::new(v.as_str()).ok());

        Ok(Self {
            user_id,
            membership_key,
            previous_checkout_id,
        })
    }
}
