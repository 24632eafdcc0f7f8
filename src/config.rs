use crate::error::{LedgerError, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments; every flag can also come from the environment.
#[derive(Parser, Debug)]
#[command(author, version, about = "Loyalty points ledger and accrual reconciliation daemon", long_about = None)]
pub struct Cli {
    /// Base address of the accrual service, e.g. http://localhost:8080
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS")]
    pub accrual_address: String,

    /// Seconds between reconciliation ticks
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Timeout for a single accrual request, in seconds
    #[arg(long, env = "ACCRUAL_TIMEOUT_SECS", default_value_t = 5)]
    pub request_timeout_secs: u64,

    /// Path to persistent database. If provided, uses RocksDB; otherwise the
    /// ledger is in-memory and starts empty.
    #[arg(long, env = "DATABASE_PATH")]
    pub db_path: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Run a single reconciliation tick, print its report and exit
    #[arg(long)]
    pub once: bool,
}

/// Validated startup configuration. Read once; never reloaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub accrual_address: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub once: bool,
}

impl TryFrom<Cli> for Config {
    type Error = LedgerError;

    fn try_from(cli: Cli) -> Result<Self> {
        let accrual_address = cli.accrual_address.trim().to_string();
        if accrual_address.is_empty() {
            return Err(LedgerError::Config("accrual address must not be empty".to_string()));
        }
        if !accrual_address.starts_with("http://") && !accrual_address.starts_with("https://") {
            return Err(LedgerError::Config(format!(
                "accrual address {accrual_address:?} must start with http:// or https://"
            )));
        }
        if cli.poll_interval_secs == 0 {
            return Err(LedgerError::Config("poll interval must be positive".to_string()));
        }
        if cli.request_timeout_secs == 0 {
            return Err(LedgerError::Config("request timeout must be positive".to_string()));
        }

        Ok(Self {
            accrual_address,
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            db_path: cli.db_path,
            log_level: cli.log_level,
            once: cli.once,
        })
    }
}
