//! Subscription record status state machine.
//!
//! ```text
//! PENDING ──► ACTIVE ──► UPGRADED
//!                   └──► CANCELLED
//! ```
//!
//! A record only becomes ACTIVE after the gateway confirms the checkout.
//! UPGRADED and CANCELLED are terminal; a retired record is never revived.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of one checkout attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout session created, payment not yet confirmed.
    Pending,

    /// Payment confirmed; this record backs the user's entitlement.
    Active,

    /// Superseded by a newer confirmed checkout for the same user.
    Upgraded,

    /// Explicitly terminated.
    Cancelled,
}

impl SubscriptionStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Upgraded => "upgraded",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if this record backs the user's current entitlement.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active) | (Active, Upgraded) | (Active, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active],
            Active => vec![Upgraded, Cancelled],
            Upgraded => vec![],
            Cancelled => vec![],
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "upgraded" => Ok(SubscriptionStatus::Upgraded),
            // Legacy rows written before the rename use "deleted".
            "cancelled" | "canceled" | "deleted" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::Active,
        SubscriptionStatus::Upgraded,
        SubscriptionStatus::Cancelled,
    ];

    // ════════════════════════════════════════════════════════════════════════════
    // Transition Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn pending_can_only_become_active() {
        assert_eq!(
            SubscriptionStatus::Pending.valid_transitions(),
            vec![SubscriptionStatus::Active]
        );
    }

    #[test]
    fn active_can_be_upgraded_or_cancelled() {
        let active = SubscriptionStatus::Active;
        assert!(active.can_transition_to(&SubscriptionStatus::Upgraded));
        assert!(active.can_transition_to(&SubscriptionStatus::Cancelled));
        assert!(!active.can_transition_to(&SubscriptionStatus::Pending));
    }

    #[test]
    fn retired_statuses_are_terminal() {
        assert!(SubscriptionStatus::Upgraded.is_terminal());
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(!SubscriptionStatus::Active.is_terminal());
    }

    #[test]
    fn cancelled_cannot_be_reactivated() {
        assert!(SubscriptionStatus::Cancelled
            .transition_to(SubscriptionStatus::Active)
            .is_err());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Parsing Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parses_storage_strings() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>(), Ok(status));
        }
    }

    #[test]
    fn parses_legacy_deleted_as_cancelled() {
        assert_eq!(
            "deleted".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Cancelled)
        );
    }

    #[test]
    fn rejects_unknown_status() {
        assert!("refunded".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::Upgraded).unwrap();
        assert_eq!(json, "\"upgraded\"");
    }

    proptest! {
        #[test]
        fn transition_to_agrees_with_valid_transitions(from in 0usize..4, to in 0usize..4) {
            let (from, to) = (ALL[from], ALL[to]);
            let allowed = from.valid_transitions().contains(&to);
            prop_assert_eq!(from.transition_to(to).is_ok(), allowed);
        }

        #[test]
        fn no_status_transitions_to_itself(idx in 0usize..4) {
            let status = ALL[idx];
            prop_assert!(!status.can_transition_to(&status));
        }
    }
}
