//! Chunked log scanning

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use futures_util::stream::{self, StreamExt};
use rpc_core::ChainApi;
use tracing::{debug, info, warn};
use crate::contracts::ContractSet;
use crate::error::Result;
use crate::indexer::decode::{decode_logs, log_filter};
use crate::models::{BlockRange, EventKind, EventRecord};

/// Split `[from, head]` into consecutive windows ending at `min(start + chunk_size, head)`.
///
/// Empty when `from > head`.
pub fn chunk_ranges(from: u64, head: u64, chunk_size: u64) -> Vec<BlockRange> {
    let mut ranges = Vec::new();
    let mut cursor = from;
    while cursor <= head {
        let chunk_end = cursor.saturating_add(chunk_size).min(head);
        ranges.push(BlockRange { from_block: cursor, to_block: chunk_end });
        if chunk_end == u64::MAX {
            break;
        }
        cursor = chunk_end + 1;
    }
    ranges
}

/// Records of one kind plus the range they cover.
#[derive(Debug, Clone)]
pub struct ScanBatch {
    pub kind: EventKind,
    pub records: Vec<EventRecord>,
    /// `None` when there was nothing to scan
    pub range: Option<BlockRange>,
}

impl ScanBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct LogScanner {
    chain: Arc<dyn ChainApi>,
    contracts: Arc<ContractSet>,
    chunk_size: u64,
    timestamp_concurrency: usize,
}

impl LogScanner {
    pub fn new(
        chain: Arc<dyn ChainApi>,
        contracts: Arc<ContractSet>,
        chunk_size: u64,
        timestamp_concurrency: usize,
    ) -> Self {
        Self {
            chain,
            contracts,
            chunk_size,
            timestamp_concurrency: timestamp_concurrency.max(1),
        }
    }

    /// Fetch every `kind` log from `from_block` up to the head observed at the start of the call.
    pub async fn scan(&self, kind: EventKind, from_block: u64) -> Result<ScanBatch> {
        let head = self.chain.current_block_height().await?;
        if from_block > head {
            debug!(kind = %kind, from_block, head, "Already at head");
            return Ok(ScanBatch { kind, records: Vec::new(), range: None });
        }

        let mut records = Vec::new();
        for chunk in chunk_ranges(from_block, head, self.chunk_size) {
            let filter = log_filter(kind, &self.contracts, chunk.from_block, chunk.to_block);
            let logs = self.chain.get_logs(&filter).await?;
            debug!(
                kind = %kind,
                from_block = chunk.from_block,
                to_block = chunk.to_block,
                logs = logs.len(),
                "Fetched chunk"
            );
            records.extend(decode_logs(kind, &self.contracts, &logs));
        }

        self.attach_timestamps(&mut records).await;

        info!(kind = %kind, from_block, to_block = head, records = records.len(), "Scan complete");
        Ok(ScanBatch {
            kind,
            records,
            range: Some(BlockRange { from_block, to_block: head }),
        })
    }

    async fn attach_timestamps(&self, records: &mut [EventRecord]) {
        let blocks: BTreeSet<u64> = records.iter().map(EventRecord::block_number).collect();
        let timestamps = fetch_block_timestamps(self.chain.as_ref(), blocks, self.timestamp_concurrency).await;

        for record in records.iter_mut() {
            let timestamp = timestamps.get(&record.block_number()).copied().flatten();
            match record {
                EventRecord::Deposit(r) => r.block_timestamp = timestamp,
                EventRecord::Interest(r) => r.block_timestamp = timestamp,
                EventRecord::Liquidation(r) => r.block_timestamp = timestamp,
            }
        }
    }
}

/// Look up each block with at most `concurrency` requests in flight.
/// A failed lookup maps to `None` and never fails the whole set.
pub async fn fetch_block_timestamps<I>(chain: &dyn ChainApi, blocks: I, concurrency: usize) -> HashMap<u64, Option<u64>>
where
    I: IntoIterator<Item = u64>,
{
    stream::iter(blocks)
        .map(|number| async move {
            match chain.get_block(number).await {
                Ok(block) => (number, Some(block.timestamp)),
                Err(e) => {
                    warn!(block = number, error = %e, "Block timestamp unavailable");
                    (number, None)
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await
}
