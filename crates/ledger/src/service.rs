//! Ledger operations: the mutation/query API consumed by a routing layer.
//!
//! Every mutating operation follows the same two-phase contract: validate
//! against the table (fail fast, no partial state), then apply to memory
//! and submit the corresponding log record under a single write-lock
//! acquisition, then publish a best-effort event. Reads take only the
//! read lock and never wait on pending disk writes — consistency is
//! read-your-write from memory, not from disk.

use std::sync::Arc;

use coffer_storage::{recover, AccountTable};
use coffer_types::{
    Amount, Balance, LedgerConfig, LedgerError, LedgerEvent, LogRecord, Result, ISSUER_ACCOUNT,
};
use parking_lot::RwLock;
use snafu::ensure;
use tokio::sync::broadcast;

use crate::coordinator::WriteCoordinator;

/// A running ledger instance bound to one storage directory.
///
/// Constructed by [`Ledger::open`], which runs recovery synchronously
/// before returning; torn down by [`Ledger::shutdown`], which flushes the
/// write queue and takes a final snapshot. Exactly one `Ledger` may own a
/// data directory at a time.
pub struct Ledger {
    table: Arc<RwLock<AccountTable>>,
    coordinator: WriteCoordinator,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Recover state from disk and start serving.
    ///
    /// Ensures the issuer account exists with an unlimited balance; if it
    /// was absent its creation is enqueued for persistence, and if present
    /// the unlimited flag is forced regardless of stored history.
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let recovered = recover(&config.data_dir)
            .map_err(|e| LedgerError::Persistence { message: e.to_string() })?;

        let table = Arc::new(RwLock::new(recovered.table));
        let coordinator = WriteCoordinator::spawn(
            recovered.log,
            recovered.snapshots,
            Arc::clone(&table),
            config,
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        {
            let mut guard = table.write();
            if guard.ensure_issuer() {
                coordinator.submit(LogRecord::SetBalance {
                    account: ISSUER_ACCOUNT.to_string(),
                    balance: Amount::zero(),
                    unlimited: true,
                });
                tracing::info!(account = ISSUER_ACCOUNT, "issuer account created");
            }
        }

        Ok(Self { table, coordinator, events })
    }

    /// Create a new account with a zero balance.
    pub fn create_account(&self, id: &str) -> Result<()> {
        let mut table = self.table.write();
        ensure!(
            !table.contains(id),
            coffer_types::error::AlreadyExistsSnafu { account: id }
        );
        let record = LogRecord::Create { account: id.to_string() };
        table.apply(&record);
        self.coordinator.submit(record);
        drop(table);

        self.publish(LedgerEvent::AccountCreated { account: id.to_string() });
        Ok(())
    }

    /// Current balance of an account.
    ///
    /// The issuer reports the [`Balance::Unlimited`] sentinel, never a
    /// number.
    pub fn balance(&self, id: &str) -> Result<Balance> {
        let table = self.table.read();
        table
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound { account: id.to_string() })
    }

    /// Public deposit path: credit a strictly positive amount.
    ///
    /// Crediting an unlimited account changes nothing but is still
    /// recorded, keeping the log a faithful operation history.
    pub fn credit(&self, id: &str, amount: Amount) -> Result<()> {
        ensure!(
            amount.is_positive(),
            coffer_types::error::InvalidAmountSnafu {
                reason: format!("deposit must be positive, got {amount}")
            }
        );

        let mut table = self.table.write();
        ensure!(table.contains(id), coffer_types::error::NotFoundSnafu { account: id });
        let record = LogRecord::Credit { account: id.to_string(), amount: amount.clone() };
        table.apply(&record);
        self.coordinator.submit(record);
        drop(table);

        self.publish(LedgerEvent::Credited { account: id.to_string(), amount });
        Ok(())
    }

    /// Move `amount` from one account to another.
    ///
    /// The debit leg is applied and logged before the credit leg, both
    /// under one lock acquisition, so no observer sees an intermediate
    /// state and replay reconstructs the same ordering. A transfer from
    /// the issuer skips the debit arithmetic entirely.
    pub fn transfer(&self, from: &str, to: &str, amount: Amount) -> Result<()> {
        ensure!(
            amount.is_positive(),
            coffer_types::error::InvalidAmountSnafu {
                reason: format!("transfer amount must be positive, got {amount}")
            }
        );

        let mut table = self.table.write();
        ensure!(table.contains(from), coffer_types::error::NotFoundSnafu { account: from });
        ensure!(table.contains(to), coffer_types::error::NotFoundSnafu { account: to });
        let sender = table.get(from).cloned().unwrap_or_else(Balance::zero);
        ensure!(
            sender.covers(&amount),
            coffer_types::error::InsufficientFundsSnafu { account: from }
        );

        let debit = LogRecord::Credit { account: from.to_string(), amount: -amount.clone() };
        table.apply(&debit);
        self.coordinator.submit(debit);

        let credit = LogRecord::Credit { account: to.to_string(), amount: amount.clone() };
        table.apply(&credit);
        self.coordinator.submit(credit);
        drop(table);

        self.publish(LedgerEvent::Transferred {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        });
        Ok(())
    }

    /// Delete an account. The issuer is protected.
    pub fn delete_account(&self, id: &str) -> Result<()> {
        ensure!(id != ISSUER_ACCOUNT, coffer_types::error::ForbiddenSnafu { account: id });

        let mut table = self.table.write();
        ensure!(table.contains(id), coffer_types::error::NotFoundSnafu { account: id });
        let record = LogRecord::Delete { account: id.to_string() };
        table.apply(&record);
        self.coordinator.submit(record);
        drop(table);

        self.publish(LedgerEvent::AccountDeleted { account: id.to_string() });
        Ok(())
    }

    /// Administrative wipe: remove every account except the issuer, then
    /// force an immediate snapshot + truncate so the log does not retain
    /// one delete record per removed account.
    ///
    /// Returns the number of accounts removed. Authentication of this
    /// call is the routing layer's concern.
    pub async fn wipe_all(&self) -> Result<u64> {
        let removed = {
            let mut table = self.table.write();
            let ids = table.non_issuer_ids();
            for id in &ids {
                let record = LogRecord::Delete { account: id.clone() };
                table.apply(&record);
                self.coordinator.submit(record);
            }
            ids.len() as u64
        };

        self.coordinator.force_snapshot().await?;
        self.publish(LedgerEvent::Wiped { removed });
        Ok(removed)
    }

    /// Whether an account exists.
    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.table.read().contains(id)
    }

    /// Number of accounts, issuer included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.table.read().len()
    }

    /// Subscribe to post-mutation events.
    ///
    /// Best-effort: a lagging subscriber misses events rather than slowing
    /// the write path, and a missed event never implies a missed persisted
    /// mutation.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Force all queued records to disk; surfaces any persistence failure
    /// retained since the last flush.
    pub async fn flush(&self) -> Result<()> {
        self.coordinator.flush().await
    }

    /// Graceful shutdown: flush the write queue, take a final snapshot,
    /// and stop the writer thread. No operation acknowledged to a caller
    /// is lost.
    pub async fn shutdown(&self) -> Result<()> {
        self.coordinator.shutdown().await
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is fine; delivery is decoupled from durability.
        let _ = self.events.send(event);
    }
}
