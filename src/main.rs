use clap::Parser;
use loyalty_ledger::application::poller::ReconciliationPoller;
use loyalty_ledger::config::{Cli, Config};
use loyalty_ledger::domain::ports::LedgerStoreRef;
use loyalty_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use loyalty_ledger::interfaces::accrual::HttpAccrualClient;
use loyalty_ledger::logging;
use miette::{IntoDiagnostic, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// The daemon only reconciles orders already in the ledger, so it is meant
/// to run against a persisted `--db-path` shared with the registration side.
/// Without one it starts from an empty in-memory ledger and has nothing to poll.
fn open_store(config: &Config) -> Result<LedgerStoreRef> {
    match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            use loyalty_ledger::infrastructure::rocksdb::RocksDBStore;
            info!(path = %db_path.display(), "Opening RocksDB ledger");
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::try_from(Cli::parse()).into_diagnostic()?;
    logging::init(&config.log_level);

    let store = open_store(&config)?;
    let client =
        HttpAccrualClient::new(&config.accrual_address, config.request_timeout).into_diagnostic()?;
    let mut poller = ReconciliationPoller::new(store, Box::new(client), config.poll_interval);

    if config.once {
        let report = poller.tick().await;
        println!(
            "pending={} resolved={} skipped={} rate_limited={} committed={} rejected={}",
            report.pending,
            report.resolved,
            report.skipped,
            report.rate_limited,
            report.committed,
            report.rejected
        );
        return Ok(());
    }

    let handle = poller.spawn();
    tokio::signal::ctrl_c().await.into_diagnostic()?;
    info!("Shutdown requested");
    handle.stop().await;

    Ok(())
}
