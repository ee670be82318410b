//! Pool stats - main entry point

use std::str::FromStr;
use std::sync::Arc;
use anyhow::Context;
use serde::Serialize;
use tracing::info;
use pool_stats::{
    api::StatsApi,
    apy::{BranchSelector, StatsRefresher},
    cli::{self, Command},
    config::Config,
    contracts::ContractSet,
    database::Database,
    indexer::{IndexerService, IndexerSettings, TimestampBackfill},
    logging::init_logging,
    models::{EventKind, HistoryFilter},
    rpc_client::RpcClient,
};
use rpc_core::ChainApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = cli::parse_args();

    let mut config = Config::load(&args.config_path)?;
    config.apply_env_overrides();
    config.apply_cli_overrides(&args);
    config.validate()?;

    init_logging(&config.logging);
    info!(database = %config.database.path.display(), "Starting pool-stats");

    let database = Arc::new(Database::new(&config.database.path).await?);
    database.migrate().await.context("Database migration failed")?;

    let contracts = Arc::new(ContractSet::from_config(&config));

    match args.command {
        Command::Sync => {
            let chain = connect(&config)?;
            let service = IndexerService::new(database, chain, contracts, IndexerSettings::from_config(&config));
            print_json(&service.run_cycle().await?)?;
        }
        Command::Snapshot => {
            let chain = connect(&config)?;
            let service = IndexerService::new(database, chain, contracts, IndexerSettings::from_config(&config));
            print_json(&service.take_snapshot().await?)?;
        }
        Command::Apy => {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            let refresher = StatsRefresher::new(database, contracts);
            print_json(&refresher.refresh(now).await?)?;
        }
        Command::BackfillTimestamps => {
            let chain = connect(&config)?;
            let backfill = TimestampBackfill::new(database, chain, config.chain.timestamp_concurrency);
            print_json(&backfill.run().await?)?;
        }
        Command::Stats { limit } => {
            print_json(&StatsApi::new(database).latest_stats(limit).await?)?;
        }
        Command::Events { branch, kind, from, to, page, page_size } => {
            let kind = kind.as_deref().map(EventKind::from_str).transpose()?;
            let filter = HistoryFilter {
                branch,
                kind,
                from_timestamp: from,
                to_timestamp: to,
            };
            let history = StatsApi::new(database)
                .event_history(&filter, Some(page), Some(page_size))
                .await?;
            print_json(&history)?;
        }
        Command::Deposits => {
            print_json(&StatsApi::new(database).stability_pool_deposits().await?)?;
        }
        Command::CalcApy { branch, from, to } => {
            let selector = BranchSelector::from_str(&branch)?;
            print_json(&StatsApi::new(database).calculate_apy(selector, from, to).await?)?;
        }
    }

    Ok(())
}

fn connect(config: &Config) -> anyhow::Result<Arc<dyn ChainApi>> {
    info!(rpc_url = %config.chain.rpc_url, "Connecting to chain node");
    let client = RpcClient::new(&config.chain.rpc_url, config.chain.multicall_address)
        .context("Failed to create RPC client")?;
    Ok(Arc::new(client))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
