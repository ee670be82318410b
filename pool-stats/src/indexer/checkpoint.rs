//! Per-kind ingestion high-water marks

use std::sync::Arc;
use tracing::{debug, warn};
use crate::database::{queries::CheckpointQueries, Database};
use crate::error::Result;
use crate::models::{BlockRange, EventKind};

pub struct CheckpointStore {
    database: Arc<Database>,
    origin_block: u64,
}

impl CheckpointStore {
    pub fn new(database: Arc<Database>, origin_block: u64) -> Self {
        Self { database, origin_block }
    }

    pub async fn get(&self, kind: EventKind) -> Result<Option<BlockRange>> {
        let state = CheckpointQueries::get(self.database.pool(), kind).await?;
        Ok(state.map(|s| BlockRange {
            from_block: s.from_block as u64,
            to_block: s.to_block as u64,
        }))
    }

    /// First block not yet ingested for `kind`.
    pub async fn start_block(&self, kind: EventKind) -> Result<u64> {
        Ok(match self.get(kind).await? {
            Some(range) => range.to_block + 1,
            None => self.origin_block,
        })
    }

    /// Record `range` as ingested. Call only once the batch covering it is persisted.
    pub async fn advance(&self, kind: EventKind, range: BlockRange) -> Result<()> {
        let advanced = CheckpointQueries::advance(
            self.database.pool(),
            kind,
            range.from_block,
            range.to_block,
        )
        .await?;

        if advanced {
            debug!(kind = %kind, from_block = range.from_block, to_block = range.to_block, "Checkpoint advanced");
        } else {
            warn!(kind = %kind, to_block = range.to_block, "Ignoring checkpoint regression");
        }
        Ok(())
    }
}
