//! Membership key value object.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tier identifier stored on the user.
///
/// It is the price lookup key the user paid for. An empty key means the
/// user has no active membership; that is the only meaning this service
/// gives to the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipKey(String);

impl MembershipKey {
    /// Wraps a key as given; surrounding whitespace is dropped.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    /// The "no membership" key.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this key grants a membership.
    pub fn is_member(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for MembershipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MembershipKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
