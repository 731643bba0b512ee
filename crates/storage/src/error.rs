//! Storage-layer error types.

use std::path::PathBuf;

use snafu::Snafu;

/// Result type for storage operations.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Errors originating in the persistence engine.
///
/// These are wrapped into `LedgerError::Persistence` when they cross the
/// ledger boundary; within this crate they keep their source context.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[snafu(display("I/O error on {path}: {source}", path = path.display()))]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record or snapshot could not be serialized.
    #[snafu(display("encode error: {source}"))]
    Encode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The committed snapshot file exists but cannot be parsed.
    ///
    /// Unlike a torn log line — which replay skips — a corrupt snapshot
    /// means the recovery baseline is gone, so this aborts startup.
    #[snafu(display("snapshot {path} is corrupt: {source}", path = path.display()))]
    SnapshotCorrupt {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}
