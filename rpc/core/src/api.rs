//! Chain capability consumed by the indexer

use async_trait::async_trait;
use crate::model::*;

/// Read-only access to an EVM node.
///
/// Every method may fail; callers decide whether a failure degrades a single
/// record, falls back to another strategy, or aborts the run.
#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn current_block_height(&self) -> Result<u64, RpcError>;
    async fn get_block(&self, number: u64) -> Result<BlockInfo, RpcError>;
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError>;

    /// Single `eth_call`, pinned to `block` when given.
    async fn call(&self, call: &ContractCall, block: Option<u64>) -> Result<Vec<u8>, RpcError>;

    /// All-or-nothing batch of calls; one failing call fails the batch.
    async fn batch_call(&self, calls: &[ContractCall], block: Option<u64>) -> Result<Vec<Vec<u8>>, RpcError>;

    /// Whether `batch_call` is backed by anything on this node.
    fn supports_batch_calls(&self) -> bool {
        true
    }
}
