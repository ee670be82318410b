use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pool-stats")]
#[command(about = "Stability pool event indexer and yield statistics", long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long = "config", default_value = "config/pool-stats.toml")]
    pub config_path: PathBuf,

    /// SQLite database file (overrides config and DATABASE_URL)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// JSON-RPC endpoint of the chain node
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest all event kinds up to the chain head, then take a pool snapshot
    Sync,

    /// Take one stability pool snapshot
    Snapshot,

    /// Recompute branch APY figures and append a global stats row
    Apy,

    /// Fill in block timestamps that failed to resolve during ingestion
    BackfillTimestamps,

    /// Print the newest global stats with branch and price maps
    Stats {
        #[arg(long, default_value_t = 1)]
        limit: i64,
    },

    /// Print stored event history, newest first
    Events {
        /// Branch id
        #[arg(long)]
        branch: Option<u8>,

        /// SP_DEPOSIT_UPDATED, TRANSFER or LIQUIDATION
        #[arg(long)]
        kind: Option<String>,

        /// Inclusive lower bound on block timestamp (seconds)
        #[arg(long)]
        from: Option<u64>,

        /// Inclusive upper bound on block timestamp (seconds)
        #[arg(long)]
        to: Option<u64>,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 100)]
        page_size: i64,
    },

    /// Print current stability pool deposits per depositor
    Deposits,

    /// Compute APY for a branch (or `all`) over a timestamp window
    CalcApy {
        #[arg(long, default_value = "all")]
        branch: String,

        #[arg(long)]
        from: u64,

        #[arg(long)]
        to: u64,
    },
}

pub fn parse_args() -> Args {
    Args::parse()
}
