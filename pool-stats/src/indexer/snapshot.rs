//! Point-in-time stability pool sampling

use std::sync::Arc;
use async_trait::async_trait;
use rpc_core::{decode_uint, ChainApi, ContractCall, U256};
use tracing::{debug, info, warn};
use crate::contracts::ContractSet;
use crate::error::{IndexerError, Result};
use crate::models::{SnapshotSample, StabilityPoolSnapshot};

/// Strategy for executing a set of `uint256` reads pinned to one block.
#[async_trait]
pub trait PoolReader: Send + Sync {
    fn name(&self) -> &'static str;

    /// One value per call, in call order.
    async fn read(&self, chain: &dyn ChainApi, calls: &[ContractCall], block: u64) -> Result<Vec<U256>>;
}

/// All reads in one all-or-nothing multicall.
pub struct BatchedReader;

#[async_trait]
impl PoolReader for BatchedReader {
    fn name(&self) -> &'static str {
        "batched"
    }

    async fn read(&self, chain: &dyn ChainApi, calls: &[ContractCall], block: u64) -> Result<Vec<U256>> {
        let results = chain.batch_call(calls, Some(block)).await?;
        if results.len() != calls.len() {
            return Err(IndexerError::Decode(format!(
                "batch returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        results
            .iter()
            .map(|data| decode_uint(data, 0).map_err(IndexerError::from))
            .collect()
    }
}

/// One `eth_call` per read, issued in order.
pub struct SequentialReader;

#[async_trait]
impl PoolReader for SequentialReader {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn read(&self, chain: &dyn ChainApi, calls: &[ContractCall], block: u64) -> Result<Vec<U256>> {
        let mut values = Vec::with_capacity(calls.len());
        for call in calls {
            let data = chain.call(call, Some(block)).await?;
            values.push(decode_uint(&data, 0)?);
        }
        Ok(values)
    }
}

pub struct SnapshotSampler {
    chain: Arc<dyn ChainApi>,
    contracts: Arc<ContractSet>,
    reader: Box<dyn PoolReader>,
    fallback: Option<Box<dyn PoolReader>>,
}

impl SnapshotSampler {
    /// Batched reads with a sequential fallback when the chain reports batching support,
    /// sequential reads only otherwise.
    pub fn new(chain: Arc<dyn ChainApi>, contracts: Arc<ContractSet>) -> Self {
        if chain.supports_batch_calls() {
            let fallback: Box<dyn PoolReader> = Box::new(SequentialReader);
            Self::with_readers(chain, contracts, Box::new(BatchedReader), Some(fallback))
        } else {
            Self::with_readers(chain, contracts, Box::new(SequentialReader), None)
        }
    }

    pub fn with_readers(
        chain: Arc<dyn ChainApi>,
        contracts: Arc<ContractSet>,
        reader: Box<dyn PoolReader>,
        fallback: Option<Box<dyn PoolReader>>,
    ) -> Self {
        Self { chain, contracts, reader, fallback }
    }

    pub fn reader_name(&self) -> &'static str {
        self.reader.name()
    }

    /// Read every branch's totals at the current head block.
    pub async fn sample(&self) -> Result<SnapshotSample> {
        let block_number = self.chain.current_block_height().await?;

        let calls: Vec<ContractCall> = self
            .contracts
            .branches()
            .iter()
            .flat_map(|branch| [branch.total_deposits_call(), branch.coll_balance_call()])
            .collect();
        let values = self.read_pinned(&calls, block_number).await?;

        let block_timestamp = self.chain.get_block(block_number).await?.timestamp;
        let bold_supply = self.read_bold_supply(block_number).await;

        let pools = self
            .contracts
            .branches()
            .iter()
            .zip(values.chunks_exact(2))
            .map(|(branch, pair)| StabilityPoolSnapshot {
                branch_id: branch.id,
                pool_address: branch.stability_pool,
                total_deposits: pair[0],
                total_collateral: pair[1],
                block_number,
                block_timestamp,
            })
            .collect::<Vec<_>>();

        info!(block = block_number, pools = pools.len(), reader = self.reader.name(), "Snapshot taken");
        Ok(SnapshotSample { block_number, block_timestamp, pools, bold_supply })
    }

    async fn read_pinned(&self, calls: &[ContractCall], block: u64) -> Result<Vec<U256>> {
        match self.reader.read(self.chain.as_ref(), calls, block).await {
            Ok(values) => Ok(values),
            Err(e) => match &self.fallback {
                Some(fallback) => {
                    warn!(
                        block,
                        error = %e,
                        reader = self.reader.name(),
                        fallback = fallback.name(),
                        "Pool read failed, retrying with fallback reader"
                    );
                    fallback.read(self.chain.as_ref(), calls, block).await
                }
                None => Err(e),
            },
        }
    }

    async fn read_bold_supply(&self, block: u64) -> Option<U256> {
        let call = self.contracts.bold_supply_call();
        let result = self
            .chain
            .call(&call, Some(block))
            .await
            .and_then(|data| decode_uint(&data, 0));
        match result {
            Ok(supply) => {
                debug!(block, supply = %supply, "Stablecoin supply read");
                Some(supply)
            }
            Err(e) => {
                warn!(block, error = %e, "Stablecoin supply unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::contracts::tests::sample_contracts;
    use rpc_core::MockChain;

    /// Chain at block 500 with known pool totals for the sample contract set.
    pub fn seeded_chain() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        let contracts = sample_contracts();
        chain.set_head(500);
        chain.add_block(500, 6_000);
        for (i, branch) in contracts.branches().iter().enumerate() {
            chain.set_call_result(branch.total_deposits_call(), U256::from(1_000u64 * (i as u64 + 1)));
            chain.set_call_result(branch.coll_balance_call(), U256::from(7u64 + i as u64));
        }
        chain.set_call_result(contracts.bold_supply_call(), U256::from(123_456u64));
        chain
    }

    fn sampler(chain: &Arc<MockChain>) -> SnapshotSampler {
        SnapshotSampler::new(chain.clone(), Arc::new(sample_contracts()))
    }

    #[tokio::test]
    async fn batched_sample_is_pinned_to_head() {
        let chain = seeded_chain();
        let sample = sampler(&chain).sample().await.unwrap();

        assert_eq!(sample.block_number, 500);
        assert_eq!(sample.block_timestamp, 6_000);
        assert_eq!(sample.pools.len(), 2);
        assert_eq!(sample.pools[1].total_deposits, U256::from(2_000u64));
        assert_eq!(sample.pools[1].total_collateral, U256::from(8u64));
        assert_eq!(sample.bold_supply, Some(U256::from(123_456u64)));
        assert_eq!(chain.batch_requests(), 1);
        assert_eq!(chain.call_blocks(), vec![Some(500)]);
    }

    #[tokio::test]
    async fn fallback_matches_batched_values() {
        let chain = seeded_chain();
        let batched = sampler(&chain).sample().await.unwrap();

        chain.fail_batch_calls(true);
        chain.clear_requests();
        let fallback = sampler(&chain).sample().await.unwrap();

        assert_eq!(batched, fallback);
        assert_eq!(chain.batch_requests(), 1);
        assert!(chain.call_blocks().iter().all(|b| *b == Some(500)));
        assert_eq!(chain.call_blocks().len(), 5);
    }

    #[tokio::test]
    async fn capability_probe_selects_sequential_reader() {
        let chain = seeded_chain();
        chain.set_batching_supported(false);
        let sampler = sampler(&chain);

        assert_eq!(sampler.reader_name(), "sequential");
        sampler.sample().await.unwrap();
        assert_eq!(chain.batch_requests(), 0);
    }

    #[tokio::test]
    async fn missing_supply_does_not_fail_snapshot() {
        let chain = Arc::new(MockChain::new());
        let contracts = sample_contracts();
        chain.set_head(3);
        chain.add_block(3, 36);
        for branch in contracts.branches() {
            chain.set_call_result(branch.total_deposits_call(), U256::one());
            chain.set_call_result(branch.coll_balance_call(), U256::one());
        }

        let sample = sampler(&chain).sample().await.unwrap();
        assert_eq!(sample.bold_supply, None);
    }

    #[tokio::test]
    async fn unreadable_head_block_aborts() {
        let chain = seeded_chain();
        chain.fail_block(500);
        assert!(sampler(&chain).sample().await.is_err());
    }
}
