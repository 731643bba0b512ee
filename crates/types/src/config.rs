//! Ledger configuration.
//!
//! Scalar knobs with sane defaults. Loading these from flags, files, or
//! the environment is the binary's concern; the core only consumes the
//! resolved struct.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for a ledger instance.
///
/// One `LedgerConfig` corresponds to exactly one storage directory, and a
/// storage directory must be owned by exactly one running ledger — two
/// writers sharing `data_dir` without coordination would each believe
/// they own the operation log.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding the operation log and snapshot files.
    pub data_dir: PathBuf,

    /// Number of appended records that triggers snapshot compaction.
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: usize,

    /// Maximum records grouped into a single disk write.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Capacity of the subscriber event channel.
    ///
    /// Delivery is best-effort; slow subscribers miss events rather than
    /// applying backpressure to the write path.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl LedgerConfig {
    /// Configuration rooted at `data_dir` with default thresholds.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_threshold: default_snapshot_threshold(),
            batch_size: default_batch_size(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_snapshot_threshold() -> usize {
    1000
}

fn default_batch_size() -> usize {
    128
}

fn default_event_capacity() -> usize {
    64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: LedgerConfig = serde_json::from_str(r#"{"data_dir":"/tmp/coffer"}"#).unwrap();
        assert_eq!(config.snapshot_threshold, 1000);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: LedgerConfig = serde_json::from_str(
            r#"{"data_dir":"/tmp/coffer","snapshot_threshold":10,"batch_size":2}"#,
        )
        .unwrap();
        assert_eq!(config.snapshot_threshold, 10);
        assert_eq!(config.batch_size, 2);
    }
}
