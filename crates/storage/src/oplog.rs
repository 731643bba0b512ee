//! Append-only operation log.
//!
//! One JSON record per line. Appends are batched by the caller (the write
//! coordinator) and synced per batch; replay streams records oldest-first
//! and tolerates a truncated trailing line left by a mid-write crash.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use coffer_types::LogRecord;
use snafu::ResultExt;

use crate::error::{EncodeSnafu, IoSnafu, Result};

/// Filename of the operation log within the data directory.
pub const LOG_FILENAME: &str = "oplog.ndjson";

/// The append-only sequential record of mutations.
///
/// Exclusively owned by the write coordinator; nothing else opens the
/// file for writing. `replay` uses an independent read handle so it can
/// run before the coordinator exists.
#[derive(Debug)]
pub struct OperationLog {
    path: PathBuf,
    file: File,
}

impl OperationLog {
    /// Open the log at `dir/oplog.ndjson`, creating it if absent.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(LOG_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(IoSnafu { path: path.clone() })?;
        Ok(Self { path, file })
    }

    /// Append a batch of records as a single buffered write, then sync.
    ///
    /// Records land on disk in slice order. An I/O failure leaves the file
    /// in an unspecified trailing state, which replay tolerates.
    pub fn append_batch(&mut self, records: &[LogRecord]) -> Result<()> {
        let mut buf = Vec::with_capacity(records.len() * 64);
        for record in records {
            serde_json::to_writer(&mut buf, record).context(EncodeSnafu)?;
            buf.push(b'\n');
        }
        self.file.write_all(&buf).context(IoSnafu { path: self.path.clone() })?;
        self.file.sync_data().context(IoSnafu { path: self.path.clone() })?;
        Ok(())
    }

    /// Replay every decodable record in original append order.
    ///
    /// Malformed lines are logged at WARN and skipped rather than
    /// aborting recovery. Lines are read as raw bytes and decoded per
    /// line, so a partial trailing line from a process killed mid-write
    /// is skipped even when the cut falls inside a multi-byte UTF-8
    /// sequence; only real read errors propagate.
    pub fn replay(&self) -> Result<Vec<LogRecord>> {
        let file = File::open(&self.path).context(IoSnafu { path: self.path.clone() })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_no, line) in reader.split(b'\n').enumerate() {
            let line = line.context(IoSnafu { path: self.path.clone() })?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<LogRecord>(&line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    tracing::warn!(
                        line = line_no + 1,
                        %error,
                        "skipping undecodable log record during replay"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Destructively clear the log.
    ///
    /// Only called by the snapshot cycle, strictly after the snapshot has
    /// been durably committed and never concurrently with an append.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0).context(IoSnafu { path: self.path.clone() })?;
        self.file
            .seek(SeekFrom::Start(0))
            .context(IoSnafu { path: self.path.clone() })?;
        self.file.sync_data().context(IoSnafu { path: self.path.clone() })?;
        Ok(())
    }

    /// Current log size in bytes, for diagnostics and compaction tests.
    pub fn len_bytes(&self) -> Result<u64> {
        let meta = self.file.metadata().context(IoSnafu { path: self.path.clone() })?;
        Ok(meta.len())
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use coffer_types::Amount;
    use tempfile::TempDir;

    use super::*;

    fn sample_records() -> Vec<LogRecord> {
        vec![
            LogRecord::Create { account: "alice".into() },
            LogRecord::Credit { account: "alice".into(), amount: Amount::from(100) },
            LogRecord::Delete { account: "alice".into() },
        ]
    }

    #[test]
    fn append_then_replay_preserves_order() {
        let dir = TempDir::new().unwrap();
        let mut log = OperationLog::open(dir.path()).unwrap();

        let records = sample_records();
        log.append_batch(&records).unwrap();

        let replayed = log.replay().unwrap();
        assert_eq!(replayed, records);
    }

    #[test]
    fn replay_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = OperationLog::open(dir.path()).unwrap();
            log.append_batch(&sample_records()).unwrap();
        }
        let log = OperationLog::open(dir.path()).unwrap();
        assert_eq!(log.replay().unwrap(), sample_records());
    }

    #[test]
    fn truncated_trailing_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut log = OperationLog::open(dir.path()).unwrap();
        log.append_batch(&sample_records()).unwrap();

        // Simulate a crash mid-append: a partial record with no newline.
        let mut raw = OpenOptions::new().append(true).open(log.path()).unwrap();
        raw.write_all(b"{\"kind\":\"credit\",\"acco").unwrap();
        raw.sync_data().unwrap();

        let replayed = log.replay().unwrap();
        assert_eq!(replayed, sample_records());
    }

    #[test]
    fn trailing_line_torn_inside_multibyte_utf8_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut log = OperationLog::open(dir.path()).unwrap();
        log.append_batch(&sample_records()).unwrap();

        // Non-ASCII account ids are written as raw UTF-8; a crash can cut
        // the file inside a multi-byte sequence ("café" torn after the
        // first byte of the 'é').
        let mut raw = OpenOptions::new().append(true).open(log.path()).unwrap();
        raw.write_all(b"{\"kind\":\"create\",\"account\":\"caf\xC3").unwrap();
        raw.sync_data().unwrap();

        let replayed = log.replay().unwrap();
        assert_eq!(replayed, sample_records());
    }

    #[test]
    fn truncate_clears_and_allows_further_appends() {
        let dir = TempDir::new().unwrap();
        let mut log = OperationLog::open(dir.path()).unwrap();
        log.append_batch(&sample_records()).unwrap();
        assert!(log.len_bytes().unwrap() > 0);

        log.truncate().unwrap();
        assert_eq!(log.len_bytes().unwrap(), 0);
        assert!(log.replay().unwrap().is_empty());

        let tail = vec![LogRecord::Create { account: "bob".into() }];
        log.append_batch(&tail).unwrap();
        assert_eq!(log.replay().unwrap(), tail);
    }

    #[test]
    fn empty_log_replays_to_nothing() {
        let dir = TempDir::new().unwrap();
        let log = OperationLog::open(dir.path()).unwrap();
        assert!(log.replay().unwrap().is_empty());
    }
}
