//! Error taxonomy for ledger operations using snafu.
//!
//! Validation errors (`NotFound`, `AlreadyExists`, `InvalidAmount`,
//! `InsufficientFunds`, `Forbidden`) are detected before any in-memory
//! mutation and returned synchronously — no partial state change occurs.
//! `Persistence` is different: it is only observable after the mutation
//! has taken effect, surfaces via `flush()` or a logged diagnostic, and
//! never unwinds applied state. Each variant is stable so a routing layer
//! can map it to a transport status.

use snafu::Snafu;

/// Unified result type for ledger operations.
pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

/// Top-level error type for ledger operations.
///
/// | Variant             | Phase        | Typical transport mapping |
/// | ------------------- | ------------ | ------------------------- |
/// | `NotFound`          | validation   | 404                       |
/// | `AlreadyExists`     | validation   | 409                       |
/// | `InvalidAmount`     | validation   | 400                       |
/// | `InsufficientFunds` | validation   | 409                       |
/// | `Forbidden`         | validation   | 403                       |
/// | `Persistence`       | asynchronous | operational alert         |
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LedgerError {
    /// The referenced account does not exist.
    #[snafu(display("account {account} not found"))]
    NotFound {
        /// Missing account id.
        account: String,
    },

    /// An account with this id already exists.
    #[snafu(display("account {account} already exists"))]
    AlreadyExists {
        /// Duplicate account id.
        account: String,
    },

    /// The amount is non-positive or not a number.
    #[snafu(display("invalid amount: {reason}"))]
    InvalidAmount {
        /// Why the amount was rejected.
        reason: String,
    },

    /// A debit would take a limited account below zero.
    ///
    /// Debits are rejected, never clamped.
    #[snafu(display("insufficient funds in account {account}"))]
    InsufficientFunds {
        /// Account that could not cover the debit.
        account: String,
    },

    /// The operation would violate the issuer account's invariants.
    #[snafu(display("operation forbidden on account {account}"))]
    Forbidden {
        /// Protected account id.
        account: String,
    },

    /// A log append or snapshot write failed at the storage layer.
    ///
    /// The triggering request already succeeded from the caller's point
    /// of view; this is reported through `flush()` and the logs, and the
    /// next accepted operation retries persistence normally.
    #[snafu(display("persistence failure: {message}"))]
    Persistence {
        /// Description of the storage failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_account() {
        let err = LedgerError::NotFound { account: "alice".into() };
        assert_eq!(err.to_string(), "account alice not found");

        let err = LedgerError::InsufficientFunds { account: "bob".into() };
        assert_eq!(err.to_string(), "insufficient funds in account bob");
    }

    #[test]
    fn variants_are_matchable_by_kind() {
        let err = LedgerError::Forbidden { account: "issuer".into() };
        assert!(matches!(err, LedgerError::Forbidden { .. }));
    }
}
