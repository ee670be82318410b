//! Repair of event rows stored without a block timestamp

use std::collections::BTreeSet;
use std::sync::Arc;
use rpc_core::ChainApi;
use serde::Serialize;
use tracing::{info, warn};
use crate::database::queries::EventQueries;
use crate::database::Database;
use crate::error::Result;
use crate::indexer::scanner::fetch_block_timestamps;
use crate::models::EventKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub blocks: usize,
    pub rows_updated: u64,
    pub failed_blocks: Vec<u64>,
}

pub struct TimestampBackfill {
    database: Arc<Database>,
    chain: Arc<dyn ChainApi>,
    concurrency: usize,
}

impl TimestampBackfill {
    pub fn new(database: Arc<Database>, chain: Arc<dyn ChainApi>, concurrency: usize) -> Self {
        Self { database, chain, concurrency }
    }

    /// Fetch each block that some row is missing a timestamp for, once, and patch every kind.
    /// Blocks that still fail are reported and left for the next invocation.
    pub async fn run(&self) -> Result<BackfillReport> {
        let pool = self.database.pool();

        let mut missing: Vec<(EventKind, Vec<i64>)> = Vec::new();
        let mut blocks = BTreeSet::new();
        for kind in EventKind::ALL {
            let kind_blocks = EventQueries::blocks_missing_timestamp(pool, kind).await?;
            blocks.extend(kind_blocks.iter().map(|b| *b as u64));
            missing.push((kind, kind_blocks));
        }

        let mut report = BackfillReport { blocks: blocks.len(), ..Default::default() };
        if blocks.is_empty() {
            info!("No rows missing block timestamps");
            return Ok(report);
        }

        let timestamps = fetch_block_timestamps(self.chain.as_ref(), blocks.iter().copied(), self.concurrency).await;

        for (kind, kind_blocks) in missing {
            for block in kind_blocks {
                let block = block as u64;
                if let Some(Some(timestamp)) = timestamps.get(&block) {
                    report.rows_updated += EventQueries::set_block_timestamp(pool, kind, block, *timestamp).await?;
                }
            }
        }

        report.failed_blocks = blocks
            .into_iter()
            .filter(|block| !matches!(timestamps.get(block), Some(Some(_))))
            .collect();

        if report.failed_blocks.is_empty() {
            info!(blocks = report.blocks, rows = report.rows_updated, "Timestamp backfill complete");
        } else {
            warn!(
                blocks = report.blocks,
                rows = report.rows_updated,
                failed = report.failed_blocks.len(),
                "Timestamp backfill incomplete"
            );
        }
        Ok(report)
    }
}
