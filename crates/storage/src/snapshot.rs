//! Snapshot store: atomic point-in-time materializations of the table.
//!
//! A snapshot is written to a temporary path in the same directory and
//! promoted with an atomic rename, so a crash mid-write never corrupts
//! the previously committed snapshot. The write-then-truncate ordering
//! with the operation log is enforced one layer up.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use coffer_types::SnapshotAccount;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{EncodeSnafu, IoSnafu, Result, SnapshotCorruptSnafu};

/// Filename of the committed snapshot within the data directory.
pub const SNAPSHOT_FILENAME: &str = "snapshot.json";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot document.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    accounts: Vec<SnapshotAccount>,
}

/// Writes and reads committed snapshots for one data directory.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl SnapshotStore {
    /// Snapshot store rooted at `dir`.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        let path = dir.join(SNAPSHOT_FILENAME);
        let tmp_path = dir.join(format!("{SNAPSHOT_FILENAME}.tmp"));
        Self { path, tmp_path }
    }

    /// Durably replace the committed snapshot with `accounts`.
    ///
    /// Serializes to the temporary path, syncs, then renames over the
    /// committed path. On any failure the previous snapshot remains
    /// intact and readable.
    pub fn write(&self, accounts: &[SnapshotAccount]) -> Result<()> {
        let doc = SnapshotFile { version: SNAPSHOT_VERSION, accounts: accounts.to_vec() };

        {
            let file = File::create(&self.tmp_path)
                .context(IoSnafu { path: self.tmp_path.clone() })?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &doc).context(EncodeSnafu)?;
            writer.write_all(b"\n").context(IoSnafu { path: self.tmp_path.clone() })?;
            let file = writer
                .into_inner()
                .map_err(|e| e.into_error())
                .context(IoSnafu { path: self.tmp_path.clone() })?;
            file.sync_data().context(IoSnafu { path: self.tmp_path.clone() })?;
        }

        fs::rename(&self.tmp_path, &self.path).context(IoSnafu { path: self.path.clone() })?;
        self.sync_dir()?;

        tracing::debug!(accounts = doc.accounts.len(), "snapshot committed");
        Ok(())
    }

    /// Read the committed snapshot.
    ///
    /// A missing file means first run and yields an empty account list. A
    /// present but unparsable file is a hard error: the recovery baseline
    /// is gone and replaying the residual log alone would silently lose
    /// state.
    pub fn read(&self) -> Result<Vec<SnapshotAccount>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context(IoSnafu { path: self.path.clone() }),
        };
        let doc: SnapshotFile = serde_json::from_slice(&bytes)
            .context(SnapshotCorruptSnafu { path: self.path.clone() })?;
        Ok(doc.accounts)
    }

    /// Path of the committed snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the rename durable by syncing the containing directory.
    fn sync_dir(&self) -> Result<()> {
        #[cfg(unix)]
        if let Some(dir) = self.path.parent() {
            let handle = OpenOptions::new()
                .read(true)
                .open(dir)
                .context(IoSnafu { path: dir.to_path_buf() })?;
            handle.sync_all().context(IoSnafu { path: dir.to_path_buf() })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use coffer_types::{Amount, Balance};
    use tempfile::TempDir;

    use super::*;

    fn entries() -> Vec<SnapshotAccount> {
        vec![
            SnapshotAccount::from_balance("alice".into(), &Balance::Funds(Amount::from(100))),
            SnapshotAccount::from_balance("issuer".into(), &Balance::Unlimited),
        ]
    }

    #[test]
    fn missing_snapshot_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write(&entries()).unwrap();

        let loaded = store.read().unwrap();
        assert_eq!(loaded, entries());
        // The temporary file must not linger after a successful commit.
        assert!(!dir.path().join(format!("{SNAPSHOT_FILENAME}.tmp")).exists());
    }

    #[test]
    fn rewrite_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write(&entries()).unwrap();

        let next =
            vec![SnapshotAccount::from_balance("bob".into(), &Balance::Funds(Amount::from(5)))];
        store.write(&next).unwrap();
        assert_eq!(store.read().unwrap(), next);
    }

    #[test]
    fn leftover_tmp_file_does_not_shadow_committed_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write(&entries()).unwrap();

        // A crash after writing the temporary file but before the rename
        // leaves garbage at the tmp path; the committed snapshot wins.
        fs::write(dir.path().join(format!("{SNAPSHOT_FILENAME}.tmp")), b"garbage").unwrap();
        assert_eq!(store.read().unwrap(), entries());
    }

    #[test]
    fn failed_write_preserves_committed_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        store.write(&entries()).unwrap();

        // Occupy the temporary path with a directory so the next write
        // fails before it can touch the committed file.
        fs::create_dir(dir.path().join(format!("{SNAPSHOT_FILENAME}.tmp"))).unwrap();
        let next =
            vec![SnapshotAccount::from_balance("bob".into(), &Balance::Funds(Amount::from(5)))];
        assert!(store.write(&next).is_err());

        assert_eq!(store.read().unwrap(), entries());
    }

    #[test]
    fn corrupt_committed_snapshot_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.read(), Err(crate::StorageError::SnapshotCorrupt { .. })));
    }
}
