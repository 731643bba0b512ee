//! Startup recovery: snapshot load + log replay.
//!
//! Runs once, synchronously, before the ledger serves any operation. The
//! issuer guarantee (step 4 of the recovery contract) is completed by the
//! ledger layer, which needs the write coordinator to persist a fresh
//! issuer creation; everything filesystem-bound happens here.

use std::fs;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{IoSnafu, Result};
use crate::oplog::OperationLog;
use crate::snapshot::SnapshotStore;
use crate::table::AccountTable;

/// The outcome of filesystem recovery.
///
/// Ownership of the log and snapshot store transfers to the write
/// coordinator; the table becomes the live shared state.
#[derive(Debug)]
pub struct RecoveredState {
    /// Reconstructed account table.
    pub table: AccountTable,
    /// Open operation log, positioned for appending.
    pub log: OperationLog,
    /// Snapshot store for the same directory.
    pub snapshots: SnapshotStore,
    /// Number of log records replayed on top of the snapshot.
    pub replayed: usize,
}

/// Reconstruct ledger state from `data_dir`.
///
/// Creates the directory, snapshot, and log on first run; otherwise loads
/// the committed snapshot and replays every decodable log record in order
/// through [`AccountTable::apply`]. Replay never re-appends to the log —
/// it reconstructs history, it does not generate new history.
pub fn recover(data_dir: &Path) -> Result<RecoveredState> {
    fs::create_dir_all(data_dir).context(IoSnafu { path: data_dir.to_path_buf() })?;

    let snapshots = SnapshotStore::new(data_dir);
    let log = OperationLog::open(data_dir)?;

    let mut table = AccountTable::from_snapshot(snapshots.read()?);
    let snapshot_accounts = table.len();

    let records = log.replay()?;
    let replayed = records.len();
    for record in &records {
        table.apply(record);
    }

    tracing::info!(
        data_dir = %data_dir.display(),
        snapshot_accounts,
        replayed,
        accounts = table.len(),
        "recovery complete"
    );

    Ok(RecoveredState { table, log, snapshots, replayed })
}
