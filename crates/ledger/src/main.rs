//! Coffer ledger daemon.
//!
//! Lifecycle host for a single-writer ledger instance: runs recovery,
//! serves until a termination signal, then flushes and snapshots. Request
//! routing is a separate front-end that embeds [`coffer_ledger::Ledger`];
//! this binary only owns the storage directory and the shutdown sequence.
//!
//! ```bash
//! cofferd --data /var/lib/coffer
//! COFFER_DATA=/var/lib/coffer COFFER_SNAPSHOT_THRESHOLD=500 cofferd
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use coffer_ledger::{shutdown_signal, Ledger};
use coffer_types::LedgerConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "cofferd", about = "Durable single-process account ledger")]
struct Cli {
    /// Storage directory for the operation log and snapshots.
    #[arg(long = "data", env = "COFFER_DATA")]
    data_dir: PathBuf,

    /// Records appended since the last snapshot that trigger compaction.
    #[arg(long, env = "COFFER_SNAPSHOT_THRESHOLD", default_value_t = 1000)]
    snapshot_threshold: usize,

    /// Maximum records grouped into one disk write.
    #[arg(long, env = "COFFER_BATCH_SIZE", default_value_t = 128)]
    batch_size: usize,

    /// Capacity of the subscriber event channel.
    #[arg(long, env = "COFFER_EVENT_CAPACITY", default_value_t = 64)]
    event_capacity: usize,
}

impl Cli {
    fn into_config(self) -> LedgerConfig {
        let mut config = LedgerConfig::new(self.data_dir);
        config.snapshot_threshold = self.snapshot_threshold;
        config.batch_size = self.batch_size;
        config.event_capacity = self.event_capacity;
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = Cli::parse().into_config();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        snapshot_threshold = config.snapshot_threshold,
        batch_size = config.batch_size,
        "starting cofferd"
    );

    let ledger = match Ledger::open(&config) {
        Ok(ledger) => ledger,
        Err(error) => {
            tracing::error!(%error, "recovery failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(accounts = ledger.count(), "ledger ready");

    shutdown_signal().await;

    match ledger.shutdown().await {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "shutdown flush failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
}
