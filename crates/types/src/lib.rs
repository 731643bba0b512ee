//! Domain types for the Coffer ledger.
//!
//! This crate holds everything the storage and service layers share:
//!
//! - [`Amount`] / [`Balance`]: arbitrary-precision balances with a
//!   distinguished unlimited sentinel for the issuer account
//! - [`LogRecord`]: the closed set of operation-log record kinds
//! - [`SnapshotAccount`]: the on-disk snapshot entry shape
//! - [`LedgerError`]: the stable error taxonomy consumed by routing layers
//! - [`LedgerConfig`]: scalar configuration knobs with sane defaults
//! - [`LedgerEvent`]: best-effort post-mutation notifications

mod amount;
mod config;
pub mod error;
mod events;
mod record;

pub use amount::{Amount, Balance};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use events::LedgerEvent;
pub use record::{LogRecord, SnapshotAccount};

/// Name of the reserved issuer account.
///
/// The issuer always exists after recovery, carries an unlimited balance,
/// and is the source of all credited funds. It can never be deleted.
pub const ISSUER_ACCOUNT: &str = "issuer";
