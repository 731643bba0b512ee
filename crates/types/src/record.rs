//! Operation-log record and snapshot entry shapes.
//!
//! A [`LogRecord`] is created at the moment a ledger operation mutates the
//! in-memory table, persisted exactly once, and eventually subsumed by a
//! snapshot. The set of kinds is closed: malformed or unknown records are
//! a deserialization failure, detected (and skipped) during replay rather
//! than surfacing as stringly-typed runtime checks.

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Balance};

/// A single operation-log entry.
///
/// Wire form is one JSON object per line, discriminated by `kind`:
///
/// ```json
/// {"kind":"create","account":"alice"}
/// {"kind":"credit","account":"alice","amount":"100"}
/// {"kind":"setBalance","account":"issuer","balance":"0","unlimited":true}
/// {"kind":"delete","account":"alice"}
/// ```
///
/// Transfers are logged as two `credit` records: a negative amount for
/// the debit leg followed by a positive amount for the credit leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LogRecord {
    /// Account creation with a zero balance.
    Create {
        /// Target account id.
        account: String,
    },
    /// Account removal.
    Delete {
        /// Target account id.
        account: String,
    },
    /// Balance adjustment by a signed amount.
    Credit {
        /// Target account id.
        account: String,
        /// Signed adjustment; negative for the debit leg of a transfer.
        amount: Amount,
    },
    /// Balance overwrite, used for issuer bootstrap and administrative sets.
    #[serde(rename_all = "camelCase")]
    SetBalance {
        /// Target account id.
        account: String,
        /// New stored balance (ignored when `unlimited` is set).
        balance: Amount,
        /// Marks the account as the unlimited issuer.
        #[serde(default, skip_serializing_if = "is_false")]
        unlimited: bool,
    },
}

impl LogRecord {
    /// The account this record targets.
    #[must_use]
    pub fn account(&self) -> &str {
        match self {
            LogRecord::Create { account }
            | LogRecord::Delete { account }
            | LogRecord::Credit { account, .. }
            | LogRecord::SetBalance { account, .. } => account,
        }
    }
}

/// One account entry within a snapshot file.
///
/// `unlimited` is omitted from the serialized form unless true, and the
/// stored balance of an unlimited account is written as zero since it is
/// not meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAccount {
    /// Account id.
    pub id: String,
    /// Stored balance as a decimal string.
    pub balance: Amount,
    /// Whether this is the unlimited issuer account.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unlimited: bool,
}

impl SnapshotAccount {
    /// Build a snapshot entry from an in-memory balance.
    #[must_use]
    pub fn from_balance(id: String, balance: &Balance) -> Self {
        match balance {
            Balance::Unlimited => Self { id, balance: Amount::zero(), unlimited: true },
            Balance::Funds(amount) => Self { id, balance: amount.clone(), unlimited: false },
        }
    }

    /// The in-memory balance this entry restores to.
    #[must_use]
    pub fn to_balance(&self) -> Balance {
        if self.unlimited {
            Balance::Unlimited
        } else {
            Balance::Funds(self.balance.clone())
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde skip_serializing_if signature
fn is_false(value: &bool) -> bool {
    !*value
}
