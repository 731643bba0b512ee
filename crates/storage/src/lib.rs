//! Persistence engine for the Coffer ledger.
//!
//! The durability story is snapshot + log:
//!
//! - [`AccountTable`]: the in-memory account map, shared by the live
//!   mutation path and log replay through one `apply` code path
//! - [`OperationLog`]: append-only newline-delimited JSON records, the
//!   source of truth between snapshots
//! - [`SnapshotStore`]: full point-in-time materializations, written to a
//!   temporary path and atomically promoted
//! - [`recover`]: the startup procedure reconstructing the table from
//!   snapshot + replay
//!
//! Write ordering, batching, and compaction triggers live one layer up in
//! `coffer-ledger`; this crate only guarantees that each primitive is
//! individually crash-safe.

#![deny(unsafe_code)]

mod error;
mod oplog;
mod recovery;
mod snapshot;
mod table;

pub use error::{Result, StorageError};
pub use oplog::{OperationLog, LOG_FILENAME};
pub use recovery::{recover, RecoveredState};
pub use snapshot::{SnapshotStore, SNAPSHOT_FILENAME};
pub use table::AccountTable;
