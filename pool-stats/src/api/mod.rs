//! Read-side facade over stored stats and history
//!
//! APY figures are stored 1e18-scaled; this is the only place they are
//! rendered as percentages.

use std::collections::BTreeMap;
use std::sync::Arc;
use sp_math::{format_percentage, parse_amount};
use crate::apy::{ApyCalculation, BranchSelector, YieldAggregator};
use crate::database::queries::{BranchStatsQueries, GlobalStatsQueries, HistoryQueries, PriceQueries};
use crate::database::Database;
use crate::error::{IndexerError, Result};
use crate::indexer::ledger::DepositLedger;
use crate::models::*;

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;

pub struct StatsApi {
    database: Arc<Database>,
    aggregator: YieldAggregator,
    ledger: DepositLedger,
}

impl StatsApi {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            aggregator: YieldAggregator::new(database.clone()),
            ledger: DepositLedger::new(database.clone()),
            database,
        }
    }

    pub async fn latest_branch_stats(&self) -> Result<Vec<BranchStatsView>> {
        BranchStatsQueries::list(self.database.pool())
            .await?
            .into_iter()
            .map(branch_view)
            .collect()
    }

    /// Newest `limit` global rows, each with the current branch map (keyed by
    /// branch name) and price map.
    pub async fn latest_stats(&self, limit: i64) -> Result<Vec<StatsOverview>> {
        let pool = self.database.pool();
        let rows = GlobalStatsQueries::latest(pool, limit.max(1)).await?;

        let branch: BTreeMap<String, BranchStatsView> = self
            .latest_branch_stats()
            .await?
            .into_iter()
            .map(|view| (view.branch_name.clone(), view))
            .collect();
        let prices: BTreeMap<String, String> = PriceQueries::list(pool)
            .await?
            .into_iter()
            .map(|p| (p.symbol, p.price))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| StatsOverview {
                total_bold_supply: row.total_bold_supply,
                total_debt_pending: row.total_debt_pending,
                total_coll_value: row.total_coll_value,
                total_sp_deposits: row.total_sp_deposits,
                total_value_locked: row.total_value_locked,
                max_sp_apy: row.max_sp_apy,
                created_at: row.created_at,
                branch: branch.clone(),
                prices: prices.clone(),
            })
            .collect())
    }

    /// Newest-first event history. `page` starts at 1; `page_size` is clamped to `1..=500`.
    pub async fn event_history(
        &self,
        filter: &HistoryFilter,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<PaginatedResponse<EventHistoryEntry>> {
        if let (Some(from), Some(to)) = (filter.from_timestamp, filter.to_timestamp) {
            if from > to {
                return Err(IndexerError::InvalidInput(format!("time range {}..{} is empty", from, to)));
            }
        }
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(page_size);

        let (data, total) = HistoryQueries::page(self.database.pool(), filter, page_size, offset).await?;
        let total_pages = (total + page_size - 1) / page_size;

        Ok(PaginatedResponse {
            data,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    pub async fn calculate_apy(&self, branch: BranchSelector, from_ts: u64, to_ts: u64) -> Result<ApyCalculation> {
        self.aggregator.calculate_apy(branch, from_ts, to_ts).await
    }

    pub async fn stability_pool_deposits(&self) -> Result<Vec<StabilityPoolDeposit>> {
        self.ledger.stability_pool_deposits().await
    }
}

fn branch_view(row: BranchStatsRow) -> Result<BranchStatsView> {
    let percent = |raw: &str| -> Result<String> { Ok(format_percentage(parse_amount(raw)?)) };

    Ok(BranchStatsView {
        branch_id: row.branch_id.to_string(),
        sp_apy_percent: percent(&row.sp_apy)?,
        apy_avg_percent: percent(&row.apy_avg)?,
        sp_apy_avg_1d_percent: percent(&row.sp_apy_avg_1d)?,
        sp_apy_avg_7d_percent: percent(&row.sp_apy_avg_7d)?,
        branch_name: row.branch_name,
        sp_deposits: row.sp_deposits,
        sp_apy: row.sp_apy,
        apy_avg: row.apy_avg,
        sp_apy_avg_1d: row.sp_apy_avg_1d,
        sp_apy_avg_7d: row.sp_apy_avg_7d,
    })
}
