//! Materialized branch and protocol-wide stats

use std::sync::Arc;
use rpc_core::U256;
use sp_math::{narrow, parse_amount, scale, sum, sum_products, widen, MathResult};
use tracing::info;
use crate::apy::aggregator::{BranchSelector, YieldAggregator};
use crate::contracts::ContractSet;
use crate::database::queries::{BranchStatsQueries, PriceQueries, SnapshotQueries};
use crate::database::Database;
use crate::error::Result;
use crate::indexer::writer::EventStore;
use crate::models::{BranchStatsUpdate, GlobalStats};

pub const ONE_DAY: u64 = 86_400;
pub const SEVEN_DAYS: u64 = 604_800;
pub const ONE_YEAR: u64 = 31_536_000;

/// Newest known totals of one branch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchTotals {
    pub sp_deposits: U256,
    pub collateral: U256,
    /// 1e18-scaled collateral price
    pub price: U256,
}

/// Fold branch totals into one protocol-wide row.
pub fn compute_global_stats(branches: &[BranchTotals], bold_supply: U256, branch_apys: &[U256]) -> MathResult<GlobalStats> {
    let total_sp_deposits = narrow(sum(branches.iter().map(|b| b.sp_deposits))?)?;
    let coll_value = sum_products(branches.iter().map(|b| (b.collateral, b.price)))? / widen(scale());
    let total_coll_value = narrow(coll_value)?;
    let total_value_locked = narrow(sum([total_coll_value, total_sp_deposits])?)?;

    Ok(GlobalStats {
        total_bold_supply: bold_supply,
        total_debt_pending: U256::zero(),
        total_coll_value,
        total_sp_deposits,
        total_value_locked,
        max_sp_apy: branch_apys.iter().copied().max().unwrap_or_default(),
    })
}

pub struct StatsRefresher {
    database: Arc<Database>,
    contracts: Arc<ContractSet>,
    aggregator: YieldAggregator,
    store: EventStore,
}

impl StatsRefresher {
    pub fn new(database: Arc<Database>, contracts: Arc<ContractSet>) -> Self {
        Self {
            aggregator: YieldAggregator::new(database.clone()),
            store: EventStore::new(database.clone(), contracts.clone()),
            database,
            contracts,
        }
    }

    /// Branch refresh followed by one appended global stats row.
    pub async fn refresh(&self, now: u64) -> Result<GlobalStats> {
        self.refresh_branch_stats(now).await?;
        self.append_global_stats().await
    }

    /// Recompute the 1d, 7d and 1y APY of every branch as of `now`.
    ///
    /// The 1y figure doubles as the current APY. Every value is stored 1e18-scaled.
    pub async fn refresh_branch_stats(&self, now: u64) -> Result<Vec<(u8, BranchStatsUpdate)>> {
        let mut updates = Vec::with_capacity(self.contracts.branches().len());

        for branch in self.contracts.branches() {
            let selector = BranchSelector::Branch(branch.id);
            let apy_1d = self.aggregator.calculate_apy(selector, now.saturating_sub(ONE_DAY), now).await?;
            let apy_7d = self.aggregator.calculate_apy(selector, now.saturating_sub(SEVEN_DAYS), now).await?;
            let apy_1y = self.aggregator.calculate_apy(selector, now.saturating_sub(ONE_YEAR), now).await?;

            let sp_deposits = SnapshotQueries::latest_for_branch(self.database.pool(), branch.id)
                .await?
                .map(|row| parse_amount(&row.total_deposits))
                .transpose()?;

            let update = BranchStatsUpdate {
                sp_deposits,
                sp_apy: Some(apy_1y.apy_raw),
                apy_avg: Some(apy_1y.apy_raw),
                sp_apy_avg_1d: Some(apy_1d.apy_raw),
                sp_apy_avg_7d: Some(apy_7d.apy_raw),
            };
            self.store.upsert_branch_stats(branch.id, &branch.symbol, &update).await?;

            info!(
                branch = branch.id,
                symbol = %branch.symbol,
                apy_1d = %apy_1d.apy_percent,
                apy_7d = %apy_7d.apy_percent,
                apy_1y = %apy_1y.apy_percent,
                "Branch stats refreshed"
            );
            updates.push((branch.id, update));
        }

        Ok(updates)
    }

    pub async fn append_global_stats(&self) -> Result<GlobalStats> {
        let pool = self.database.pool();

        let mut totals = Vec::with_capacity(self.contracts.branches().len());
        for branch in self.contracts.branches() {
            let mut branch_totals = BranchTotals::default();
            if let Some(row) = SnapshotQueries::latest_for_branch(pool, branch.id).await? {
                branch_totals.sp_deposits = parse_amount(&row.total_deposits)?;
                branch_totals.collateral = parse_amount(&row.total_collateral)?;
            }
            if let Some(price) = PriceQueries::get(pool, &branch.symbol).await? {
                branch_totals.price = parse_amount(&price.price)?;
            }
            totals.push(branch_totals);
        }

        let bold_supply = match SnapshotQueries::latest_supply(pool).await? {
            Some(supply) => parse_amount(&supply)?,
            None => U256::zero(),
        };

        let apys = BranchStatsQueries::list(pool)
            .await?
            .iter()
            .map(|row| parse_amount(&row.sp_apy))
            .collect::<MathResult<Vec<_>>>()?;

        let stats = compute_global_stats(&totals, bold_supply, &apys)?;
        self.store.append_global_stats(&stats).await?;

        info!(
            tvl = %stats.total_value_locked,
            sp_deposits = %stats.total_sp_deposits,
            max_sp_apy = %stats.max_sp_apy,
            "Global stats appended"
        );
        Ok(stats)
    }
}
