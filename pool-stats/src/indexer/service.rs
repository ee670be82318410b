//! One ingestion run: checkpoint, scan, persist, advance, then snapshot

use std::sync::Arc;
use rpc_core::ChainApi;
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;
use crate::config::Config;
use crate::contracts::ContractSet;
use crate::database::Database;
use crate::error::Result;
use crate::indexer::checkpoint::CheckpointStore;
use crate::indexer::ledger::DepositLedger;
use crate::indexer::scanner::LogScanner;
use crate::indexer::snapshot::SnapshotSampler;
use crate::indexer::writer::EventStore;
use crate::models::{BlockRange, EventKind, SnapshotSample};

#[derive(Debug, Clone, Copy)]
pub struct IndexerSettings {
    pub origin_block: u64,
    pub chunk_size: u64,
    pub timestamp_concurrency: usize,
}

impl IndexerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin_block: config.chain.origin_block,
            chunk_size: config.chain.log_chunk_size,
            timestamp_concurrency: config.chain.timestamp_concurrency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindReport {
    pub kind: EventKind,
    pub range: Option<BlockRange>,
    pub records: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub kinds: Vec<KindReport>,
    pub snapshot_block: u64,
}

pub struct IndexerService {
    checkpoints: CheckpointStore,
    scanner: LogScanner,
    store: EventStore,
    sampler: SnapshotSampler,
    ledger: DepositLedger,
}

impl IndexerService {
    pub fn new(
        database: Arc<Database>,
        chain: Arc<dyn ChainApi>,
        contracts: Arc<ContractSet>,
        settings: IndexerSettings,
    ) -> Self {
        Self {
            checkpoints: CheckpointStore::new(database.clone(), settings.origin_block),
            scanner: LogScanner::new(
                chain.clone(),
                contracts.clone(),
                settings.chunk_size,
                settings.timestamp_concurrency,
            ),
            store: EventStore::new(database.clone(), contracts.clone()),
            sampler: SnapshotSampler::new(chain, contracts),
            ledger: DepositLedger::new(database),
        }
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Bring one kind up to the current head.
    ///
    /// The checkpoint moves only after the batch is committed; a failure
    /// anywhere before that leaves it untouched so the next run re-scans.
    pub async fn ingest(&self, kind: EventKind) -> Result<KindReport> {
        let from_block = self.checkpoints.start_block(kind).await?;
        let batch = self.scanner.scan(kind, from_block).await?;
        let summary = self.store.persist(&batch.records).await?;

        // a replay can insert nothing yet still follow a commit whose rebuild never ran
        if kind == EventKind::DepositUpdated && batch.range.is_some() {
            self.ledger.rebuild().await?;
        }
        if let Some(range) = batch.range {
            self.checkpoints.advance(kind, range).await?;
        }

        Ok(KindReport {
            kind,
            range: batch.range,
            records: batch.records.len(),
            inserted: summary.inserted,
            duplicates: summary.duplicates,
        })
    }

    pub async fn ingest_all(&self) -> Result<Vec<KindReport>> {
        let mut reports = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            reports.push(self.ingest(kind).await?);
        }
        Ok(reports)
    }

    pub async fn take_snapshot(&self) -> Result<SnapshotSample> {
        let sample = self.sampler.sample().await?;
        self.store.persist_snapshot(&sample).await?;
        Ok(sample)
    }

    /// Every kind, then one snapshot, under a fresh `run_id`.
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", run_id = %run_id);

        async move {
            info!("Starting ingestion run");
            let kinds = self.ingest_all().await?;
            let sample = self.take_snapshot().await?;
            info!(snapshot_block = sample.block_number, "Ingestion run complete");
            Ok(SyncReport {
                run_id,
                kinds,
                snapshot_block: sample.block_number,
            })
        }
        .instrument(span)
        .await
    }
}
