//! Write coordinator: the single funnel between in-memory mutation and
//! durable persistence.
//!
//! A dedicated writer thread exclusively owns the operation log and the
//! snapshot store. Every mutation's record passes through its command
//! channel, guaranteeing that records reach disk in exactly the order the
//! mutations were applied to memory, that appends are batched for
//! throughput, and that snapshot compaction runs inside the same
//! serialized write path as the appends it subsumes.
//!
//! # Ordering with the account table
//!
//! The ledger layer holds the table's write lock across apply + submit,
//! so by the time the writer thread can take a read lock on the table,
//! every mutation visible in memory already has its record queued or
//! appended. The snapshot cycle exploits this: read-lock the table, drain
//! and append everything queued, materialize, release, commit, truncate.
//! A snapshot therefore never contains the effect of a record that could
//! later be replayed on top of it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use coffer_storage::{AccountTable, OperationLog, SnapshotStore, StorageError};
use coffer_types::{LedgerConfig, LedgerError, LogRecord};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};

type Ack = oneshot::Sender<Result<(), LedgerError>>;

enum Command {
    Append(LogRecord),
    Flush(Ack),
    Snapshot(Ack),
    Shutdown(Ack),
}

/// Handle to the writer thread.
///
/// Cloneable submission is not needed — the ledger owns the one handle —
/// so the handle also carries the join guard for shutdown.
pub struct WriteCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl WriteCoordinator {
    /// Spawn the writer thread over a freshly recovered log + snapshot
    /// store.
    #[must_use]
    pub fn spawn(
        log: OperationLog,
        snapshots: SnapshotStore,
        table: Arc<RwLock<AccountTable>>,
        config: &LedgerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut writer = Writer {
            rx,
            log,
            snapshots,
            table,
            batch_size: config.batch_size.max(1),
            snapshot_threshold: config.snapshot_threshold.max(1),
            since_snapshot: 0,
            last_error: None,
            deferred: VecDeque::new(),
        };
        let join = std::thread::Builder::new()
            .name("coffer-writer".into())
            .spawn(move || writer.run())
            .unwrap_or_else(|e| panic!("failed to spawn writer thread: {e}"));
        Self { tx, join: Mutex::new(Some(join)) }
    }

    /// Queue one record for durable appending.
    ///
    /// Non-blocking: the in-memory mutation has already happened and is
    /// never rolled back. If persistence ultimately fails the error is
    /// logged and surfaced to the next [`flush`](Self::flush) caller.
    pub fn submit(&self, record: LogRecord) {
        if self.tx.send(Command::Append(record)).is_err() {
            tracing::error!("writer thread gone, record dropped");
        }
    }

    /// Force all queued records to disk and report any persistence
    /// failure retained since the last flush.
    ///
    /// Idempotent and callable any number of times.
    pub async fn flush(&self) -> Result<(), LedgerError> {
        self.roundtrip(Command::Flush).await
    }

    /// Run a snapshot + truncate cycle now, regardless of the threshold.
    pub async fn force_snapshot(&self) -> Result<(), LedgerError> {
        self.roundtrip(Command::Snapshot).await
    }

    /// Flush, take a final snapshot, and stop the writer thread.
    pub async fn shutdown(&self) -> Result<(), LedgerError> {
        let result = self.roundtrip(Command::Shutdown).await;
        if let Some(join) = self.join.lock().take() {
            if join.join().is_err() {
                tracing::error!("writer thread panicked during shutdown");
            }
        }
        result
    }

    async fn roundtrip(
        &self,
        make: impl FnOnce(Ack) -> Command,
    ) -> Result<(), LedgerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(make(ack_tx)).is_err() {
            // Writer already stopped; a second shutdown/flush is a no-op.
            return Ok(());
        }
        match ack_rx.await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Persistence {
                message: "writer thread stopped before acknowledging".into(),
            }),
        }
    }
}

struct Writer {
    rx: mpsc::UnboundedReceiver<Command>,
    log: OperationLog,
    snapshots: SnapshotStore,
    table: Arc<RwLock<AccountTable>>,
    batch_size: usize,
    snapshot_threshold: usize,
    since_snapshot: usize,
    /// First persistence failure since the last successful flush.
    last_error: Option<String>,
    /// Commands drained out of order during batching or a snapshot cycle.
    deferred: VecDeque<Command>,
}

impl Writer {
    fn run(&mut self) {
        loop {
            let command = match self.deferred.pop_front() {
                Some(command) => command,
                None => match self.rx.blocking_recv() {
                    Some(command) => command,
                    // All senders dropped: ledger is gone, stop quietly.
                    None => break,
                },
            };

            match command {
                Command::Append(record) => {
                    let mut batch = vec![record];
                    self.fill_batch(&mut batch);
                    self.append(&batch);
                    if self.since_snapshot >= self.snapshot_threshold {
                        let _ = self.snapshot_cycle();
                    }
                }
                Command::Flush(ack) => {
                    let _ = ack.send(self.take_error());
                }
                Command::Snapshot(ack) => {
                    let result = self.snapshot_cycle();
                    let _ = ack.send(result);
                }
                Command::Shutdown(ack) => {
                    self.drain_all();
                    let mut result = self.snapshot_cycle();
                    if let Some(message) = self.last_error.take() {
                        result = result.and(Err(LedgerError::Persistence { message }));
                    }
                    let _ = ack.send(result);
                    break;
                }
            }
        }
    }

    /// Greedily extend `batch` with queued appends, up to the batch size.
    /// Non-append commands encountered mid-drain keep their queue order
    /// via the deferred buffer.
    fn fill_batch(&mut self, batch: &mut Vec<LogRecord>) {
        while batch.len() < self.batch_size {
            match self.rx.try_recv() {
                Ok(Command::Append(record)) => batch.push(record),
                Ok(other) => {
                    self.deferred.push_back(other);
                    break;
                }
                Err(_) => break,
            }
        }
    }

    fn append(&mut self, batch: &[LogRecord]) {
        match self.log.append_batch(batch) {
            Ok(()) => {
                self.since_snapshot += batch.len();
            }
            Err(error) => self.record_failure("log append failed", &error),
        }
    }

    /// Snapshot + truncate, in that mandatory order.
    ///
    /// Truncating first and crashing before the snapshot commits would
    /// lose every record the snapshot was meant to subsume.
    fn snapshot_cycle(&mut self) -> Result<(), LedgerError> {
        // With the read lock held no mutation can be mid-flight, so the
        // queue drained below contains every record whose effect is
        // visible in the table.
        let accounts = {
            let table = Arc::clone(&self.table);
            let guard = table.read();
            let mut pending = Vec::new();
            loop {
                match self.rx.try_recv() {
                    Ok(Command::Append(record)) => pending.push(record),
                    Ok(other) => self.deferred.push_back(other),
                    Err(_) => break,
                }
            }
            if !pending.is_empty() {
                if let Err(error) = self.log.append_batch(&pending) {
                    self.record_failure("log append failed", &error);
                    return Err(LedgerError::Persistence { message: error.to_string() });
                }
                self.since_snapshot += pending.len();
            }
            guard.to_snapshot()
        };

        if let Err(error) = self.snapshots.write(&accounts) {
            self.record_failure("snapshot write failed", &error);
            return Err(LedgerError::Persistence { message: error.to_string() });
        }
        if let Err(error) = self.log.truncate() {
            // The snapshot is committed; a stale log tail would replay as
            // duplicates, so this must be surfaced loudly.
            self.record_failure("log truncate failed", &error);
            return Err(LedgerError::Persistence { message: error.to_string() });
        }
        tracing::info!(
            accounts = accounts.len(),
            subsumed = self.since_snapshot,
            "snapshot compaction complete"
        );
        self.since_snapshot = 0;
        Ok(())
    }

    /// Append everything still queued; used by shutdown.
    fn drain_all(&mut self) {
        let mut pending = Vec::new();
        let mut deferred = std::mem::take(&mut self.deferred);
        while let Some(command) = deferred.pop_front() {
            match command {
                Command::Append(record) => pending.push(record),
                Command::Flush(ack) => {
                    let _ = ack.send(self.take_error());
                }
                Command::Snapshot(ack) => {
                    // Subsumed by the final shutdown snapshot.
                    let _ = ack.send(Ok(()));
                }
                Command::Shutdown(ack) => {
                    let _ = ack.send(Ok(()));
                }
            }
        }
        loop {
            match self.rx.try_recv() {
                Ok(Command::Append(record)) => pending.push(record),
                Ok(Command::Flush(ack)) | Ok(Command::Shutdown(ack)) => {
                    let _ = ack.send(self.take_error());
                }
                Ok(Command::Snapshot(ack)) => {
                    let _ = ack.send(Ok(()));
                }
                Err(_) => break,
            }
        }
        if !pending.is_empty() {
            self.append(&pending);
        }
    }

    fn record_failure(&mut self, context: &str, error: &StorageError) {
        tracing::error!(%error, "{context}");
        if self.last_error.is_none() {
            self.last_error = Some(format!("{context}: {error}"));
        }
    }

    fn take_error(&mut self) -> Result<(), LedgerError> {
        match self.last_error.take() {
            None => Ok(()),
            Some(message) => Err(LedgerError::Persistence { message }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use coffer_storage::recover;
    use coffer_types::{Amount, Balance};
    use tempfile::TempDir;

    use super::*;

    fn open_coordinator(
        dir: &std::path::Path,
        config: &LedgerConfig,
    ) -> (WriteCoordinator, Arc<RwLock<AccountTable>>) {
        let recovered = recover(dir).unwrap();
        let table = Arc::new(RwLock::new(recovered.table));
        let coordinator =
            WriteCoordinator::spawn(recovered.log, recovered.snapshots, table.clone(), config);
        (coordinator, table)
    }

    fn apply_and_submit(
        table: &Arc<RwLock<AccountTable>>,
        coordinator: &WriteCoordinator,
        record: LogRecord,
    ) {
        let mut guard = table.write();
        guard.apply(&record);
        coordinator.submit(record);
    }

    #[tokio::test]
    async fn submitted_records_are_durable_after_flush() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(dir.path());
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        apply_and_submit(&table, &coordinator, LogRecord::Create { account: "alice".into() });
        apply_and_submit(
            &table,
            &coordinator,
            LogRecord::Credit { account: "alice".into(), amount: Amount::from(40) },
        );
        coordinator.flush().await.unwrap();
        coordinator.shutdown().await.unwrap();

        let recovered = recover(dir.path()).unwrap();
        assert_eq!(recovered.table.get("alice"), Some(&Balance::Funds(Amount::from(40))));
    }

    #[tokio::test]
    async fn threshold_triggers_exactly_one_compaction() {
        let dir = TempDir::new().unwrap();
        let mut config = LedgerConfig::new(dir.path());
        config.snapshot_threshold = 10;
        config.batch_size = 4;
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        for i in 0..10 {
            apply_and_submit(
                &table,
                &coordinator,
                LogRecord::Create { account: format!("acct-{i}") },
            );
        }
        coordinator.flush().await.unwrap();

        // All ten records are subsumed by the snapshot; log is empty.
        let recovered = recover(dir.path()).unwrap();
        assert_eq!(recovered.replayed, 0);
        assert_eq!(recovered.table.len(), 10);
        coordinator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_after_compaction_covers_later_records() {
        let dir = TempDir::new().unwrap();
        let mut config = LedgerConfig::new(dir.path());
        config.snapshot_threshold = 5;
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        for i in 0..7 {
            apply_and_submit(
                &table,
                &coordinator,
                LogRecord::Create { account: format!("acct-{i}") },
            );
        }
        coordinator.flush().await.unwrap();
        coordinator.shutdown().await.unwrap();

        // Snapshot holds the first chunk, the residual log the rest;
        // together they reconstruct all seven accounts.
        let recovered = recover(dir.path()).unwrap();
        assert_eq!(recovered.table.len(), 7);
    }

    #[tokio::test]
    async fn force_snapshot_truncates_regardless_of_threshold() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(dir.path());
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        apply_and_submit(&table, &coordinator, LogRecord::Create { account: "alice".into() });
        coordinator.force_snapshot().await.unwrap();
        coordinator.shutdown().await.unwrap();

        let recovered = recover(dir.path()).unwrap();
        assert_eq!(recovered.replayed, 0);
        assert!(recovered.table.contains("alice"));
    }

    #[tokio::test]
    async fn failed_snapshot_keeps_log_intact() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(dir.path());
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        apply_and_submit(&table, &coordinator, LogRecord::Create { account: "alice".into() });
        coordinator.flush().await.unwrap();

        // Wedge the snapshot temporary path so the write fails.
        std::fs::create_dir(dir.path().join("snapshot.json.tmp")).unwrap();
        let result = coordinator.force_snapshot().await;
        assert!(matches!(result, Err(LedgerError::Persistence { .. })));

        // The log still carries the record; recovery is unaffected.
        std::fs::remove_dir(dir.path().join("snapshot.json.tmp")).unwrap();
        drop(coordinator);
        let recovered = recover(dir.path()).unwrap();
        assert_eq!(recovered.replayed, 1);
        assert!(recovered.table.contains("alice"));
    }

    #[tokio::test]
    async fn flush_surfaces_retained_persistence_failure_once() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(dir.path());
        let (coordinator, table) = open_coordinator(dir.path(), &config);

        apply_and_submit(&table, &coordinator, LogRecord::Create { account: "alice".into() });
        std::fs::create_dir(dir.path().join("snapshot.json.tmp")).unwrap();
        // The immediate error is deliberately dropped, as a caller that
        // only ever flushes would drop it.
        let _ = coordinator.force_snapshot().await;

        // The retained failure comes back through the next flush, and
        // only that one: reporting resets it.
        let result = coordinator.flush().await;
        assert!(matches!(result, Err(LedgerError::Persistence { .. })));
        coordinator.flush().await.unwrap();

        std::fs::remove_dir(dir.path().join("snapshot.json.tmp")).unwrap();
        coordinator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn flush_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(dir.path());
        let (coordinator, _table) = open_coordinator(dir.path(), &config);

        coordinator.flush().await.unwrap();
        coordinator.flush().await.unwrap();
        coordinator.shutdown().await.unwrap();
        // A second shutdown is a quiet no-op.
        coordinator.shutdown().await.unwrap();
    }
}
