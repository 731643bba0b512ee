//! Outbound event notifications.
//!
//! After a successful mutation the ledger publishes one of these to its
//! subscriber channel. Delivery is best-effort and explicitly decoupled
//! from persistence: a missed event never implies a missed persisted
//! mutation, and vice versa.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// A post-mutation notification published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A new account was created with a zero balance.
    AccountCreated {
        /// New account id.
        account: String,
    },
    /// An account was credited via the public deposit path.
    Credited {
        /// Credited account id.
        account: String,
        /// Deposited amount (always positive).
        amount: Amount,
    },
    /// Funds moved between two accounts.
    Transferred {
        /// Debited account id.
        from: String,
        /// Credited account id.
        to: String,
        /// Transferred amount (always positive).
        amount: Amount,
    },
    /// An account was deleted.
    AccountDeleted {
        /// Removed account id.
        account: String,
    },
    /// All non-issuer accounts were administratively removed.
    Wiped {
        /// Number of accounts removed.
        removed: u64,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_form() {
        let event = LedgerEvent::Transferred {
            from: "issuer".into(),
            to: "alice".into(),
            amount: Amount::from(100),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"transferred","from":"issuer","to":"alice","amount":"100"}"#
        );
    }
}
