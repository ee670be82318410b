//! Idempotent persistence of scanned records and derived state

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use crate::contracts::ContractSet;
use crate::database::queries::*;
use crate::database::Database;
use crate::error::Result;
use crate::models::*;

/// Outcome of persisting one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

pub struct EventStore {
    database: Arc<Database>,
    contracts: Arc<ContractSet>,
}

impl EventStore {
    pub fn new(database: Arc<Database>, contracts: Arc<ContractSet>) -> Self {
        Self { database, contracts }
    }

    /// Insert a batch in one transaction. Rows already stored under the same
    /// `(transaction_hash, log_index)` are skipped, so re-delivery is harmless.
    pub async fn persist(&self, records: &[EventRecord]) -> Result<PersistSummary> {
        let mut summary = PersistSummary::default();
        if records.is_empty() {
            return Ok(summary);
        }

        let mut tx = self.database.pool().begin().await?;
        let mut liquidated_branches = BTreeSet::new();

        for record in records {
            let inserted = match record {
                EventRecord::Deposit(r) => EventQueries::insert_deposit(&mut tx, r).await?,
                EventRecord::Interest(r) => EventQueries::insert_interest(&mut tx, r).await?,
                EventRecord::Liquidation(r) => {
                    liquidated_branches.insert(r.branch_id);
                    EventQueries::insert_liquidation(&mut tx, r).await?
                }
            };
            if inserted {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }

        for branch_id in liquidated_branches {
            let Some(branch) = self.contracts.branch(branch_id) else {
                continue;
            };
            if let Some(price) = EventQueries::latest_liquidation_price(&mut tx, branch_id).await? {
                PriceQueries::upsert(&mut tx, &branch.symbol, &price).await?;
                debug!(symbol = %branch.symbol, price = %price, "Price updated from liquidation");
            }
        }

        tx.commit().await?;

        info!(
            records = records.len(),
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "Batch persisted"
        );
        Ok(summary)
    }

    /// Store one sample; returns the number of new pool rows.
    pub async fn persist_snapshot(&self, sample: &SnapshotSample) -> Result<usize> {
        let mut tx = self.database.pool().begin().await?;

        let mut inserted = 0;
        for snapshot in &sample.pools {
            if SnapshotQueries::insert(&mut tx, snapshot).await? {
                inserted += 1;
            }
        }
        if let Some(supply) = sample.bold_supply {
            SnapshotQueries::insert_supply(&mut tx, sample.block_number, sample.block_timestamp, supply).await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn upsert_branch_stats(&self, branch_id: u8, branch_name: &str, update: &BranchStatsUpdate) -> Result<()> {
        BranchStatsQueries::upsert(self.database.pool(), branch_id, branch_name, update).await
    }

    pub async fn append_global_stats(&self, stats: &GlobalStats) -> Result<()> {
        GlobalStatsQueries::insert(self.database.pool(), stats).await
    }
}
