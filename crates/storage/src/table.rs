//! In-memory account table.
//!
//! A plain map with no durability logic and no internal synchronization:
//! all writers funnel through the ledger layer, which holds the table's
//! write lock across mutation + log submission (single-writer invariant).

use std::collections::HashMap;

use coffer_types::{Balance, LogRecord, SnapshotAccount, ISSUER_ACCOUNT};

/// The in-memory mapping from account id to balance state.
#[derive(Debug, Default)]
pub struct AccountTable {
    accounts: HashMap<String, Balance>,
}

impl AccountTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an account's balance.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Balance> {
        self.accounts.get(id)
    }

    /// Insert or overwrite an account.
    pub fn put(&mut self, id: String, balance: Balance) {
        self.accounts.insert(id, balance);
    }

    /// Remove an account, returning its balance if present.
    pub fn remove(&mut self, id: &str) -> Option<Balance> {
        self.accounts.remove(id)
    }

    /// Whether an account exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    /// Number of accounts, issuer included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// All accounts in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Balance)> {
        self.accounts.iter()
    }

    /// Ids of all non-issuer accounts.
    ///
    /// Used by the administrative wipe to enumerate deletion targets.
    #[must_use]
    pub fn non_issuer_ids(&self) -> Vec<String> {
        self.accounts.keys().filter(|id| *id != ISSUER_ACCOUNT).cloned().collect()
    }

    /// Materialize the table as snapshot entries, sorted by id so the
    /// snapshot file is deterministic.
    #[must_use]
    pub fn to_snapshot(&self) -> Vec<SnapshotAccount> {
        let mut entries: Vec<SnapshotAccount> = self
            .accounts
            .iter()
            .map(|(id, balance)| SnapshotAccount::from_balance(id.clone(), balance))
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Rebuild a table from snapshot entries.
    #[must_use]
    pub fn from_snapshot(entries: Vec<SnapshotAccount>) -> Self {
        let accounts =
            entries.into_iter().map(|entry| (entry.id.clone(), entry.to_balance())).collect();
        Self { accounts }
    }

    /// Apply one log record to the table.
    ///
    /// This is the single mutation code path shared by live operations and
    /// recovery replay, so replaying the log reproduces exactly the state
    /// reached live. Replay semantics are deliberately lenient:
    ///
    /// - `create` of an existing account is a no-op, not an error
    /// - `credit` of a missing account is skipped with a warning
    /// - `credit` of an unlimited balance leaves it untouched
    /// - `setBalance` inserts or overwrites unconditionally
    /// - `delete` of a missing account is a no-op
    ///
    /// Validation (duplicate creation, overdrafts, issuer protection)
    /// belongs to the ledger operations layer, which checks before it
    /// constructs a record.
    pub fn apply(&mut self, record: &LogRecord) {
        match record {
            LogRecord::Create { account } => {
                self.accounts.entry(account.clone()).or_insert_with(Balance::zero);
            }
            LogRecord::Delete { account } => {
                self.accounts.remove(account);
            }
            LogRecord::Credit { account, amount } => match self.accounts.get_mut(account) {
                Some(balance) => balance.credit(amount),
                None => {
                    tracing::warn!(account, "credit for unknown account, skipping");
                }
            },
            LogRecord::SetBalance { account, balance, unlimited } => {
                let restored = if *unlimited {
                    Balance::Unlimited
                } else {
                    Balance::Funds(balance.clone())
                };
                self.accounts.insert(account.clone(), restored);
            }
        }
    }

    /// Force the issuer account to exist with an unlimited balance.
    ///
    /// Returns `true` if the issuer had to be created, `false` if it was
    /// already present (its balance is overwritten with the sentinel
    /// either way, healing any corrupt historical state).
    pub fn ensure_issuer(&mut self) -> bool {
        let created = !self.accounts.contains_key(ISSUER_ACCOUNT);
        self.accounts.insert(ISSUER_ACCOUNT.to_string(), Balance::Unlimited);
        created
    }
}
