//! In-memory chain implementing `ChainApi` for test suites; compiled only
//! under `cfg(test)` or the `test-util` feature

use std::collections::{HashMap, HashSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use crate::api::ChainApi;
use crate::model::*;

#[derive(Default)]
struct MockState {
    head: u64,
    blocks: HashMap<u64, u64>,
    logs: Vec<RawLog>,
    call_results: HashMap<ContractCall, Vec<u8>>,
    failing_blocks: HashSet<u64>,
    fail_batch_calls: bool,
    fail_logs: bool,
    batching_supported: bool,
    log_requests: Vec<(u64, u64)>,
    block_requests: Vec<u64>,
    call_blocks: Vec<Option<u64>>,
    batch_requests: usize,
}

/// Chain state held in memory. Cheap to share behind an `Arc`.
pub struct MockChain {
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                batching_supported: true,
                ..MockState::default()
            }),
        }
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().head = head;
    }

    pub fn add_block(&self, number: u64, timestamp: u64) {
        self.state.lock().blocks.insert(number, timestamp);
    }

    pub fn push_log(&self, log: RawLog) {
        self.state.lock().logs.push(log);
    }

    pub fn set_call_result(&self, call: ContractCall, value: U256) {
        self.state.lock().call_results.insert(call, encode_uint(value));
    }

    pub fn fail_block(&self, number: u64) {
        self.state.lock().failing_blocks.insert(number);
    }

    pub fn fail_batch_calls(&self, fail: bool) {
        self.state.lock().fail_batch_calls = fail;
    }

    pub fn fail_logs(&self, fail: bool) {
        self.state.lock().fail_logs = fail;
    }

    pub fn set_batching_supported(&self, supported: bool) {
        self.state.lock().batching_supported = supported;
    }

    /// Ranges passed to `get_logs`, in call order.
    pub fn log_requests(&self) -> Vec<(u64, u64)> {
        self.state.lock().log_requests.clone()
    }

    /// Block numbers passed to `get_block`, in call order.
    pub fn block_requests(&self) -> Vec<u64> {
        self.state.lock().block_requests.clone()
    }

    /// Block pins of every single call, in call order.
    pub fn call_blocks(&self) -> Vec<Option<u64>> {
        self.state.lock().call_blocks.clone()
    }

    pub fn batch_requests(&self) -> usize {
        self.state.lock().batch_requests
    }

    pub fn clear_requests(&self) {
        let mut state = self.state.lock();
        state.log_requests.clear();
        state.block_requests.clear();
        state.call_blocks.clear();
        state.batch_requests = 0;
    }

    fn lookup_call(state: &MockState, call: &ContractCall) -> Result<Vec<u8>, RpcError> {
        state.call_results.get(call).cloned().ok_or_else(|| RpcError::Rpc {
            code: -32000,
            message: format!("execution reverted: no result for call to {:?}", call.target),
        })
    }
}

#[async_trait]
impl ChainApi for MockChain {
    async fn current_block_height(&self) -> Result<u64, RpcError> {
        Ok(self.state.lock().head)
    }

    async fn get_block(&self, number: u64) -> Result<BlockInfo, RpcError> {
        let mut state = self.state.lock();
        state.block_requests.push(number);
        if state.failing_blocks.contains(&number) {
            return Err(RpcError::Network(format!("timeout fetching block {}", number)));
        }
        state
            .blocks
            .get(&number)
            .map(|timestamp| BlockInfo { number, timestamp: *timestamp })
            .ok_or_else(|| RpcError::NotFound(format!("block {}", number)))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let mut state = self.state.lock();
        state.log_requests.push((filter.from_block, filter.to_block));
        if state.fail_logs {
            return Err(RpcError::Rpc { code: -32005, message: "query returned more than 10000 results".into() });
        }
        let mut logs: Vec<RawLog> = state.logs.iter().filter(|log| filter.matches(log)).cloned().collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn call(&self, call: &ContractCall, block: Option<u64>) -> Result<Vec<u8>, RpcError> {
        let mut state = self.state.lock();
        state.call_blocks.push(block);
        Self::lookup_call(&state, call)
    }

    async fn batch_call(&self, calls: &[ContractCall], _block: Option<u64>) -> Result<Vec<Vec<u8>>, RpcError> {
        let mut state = self.state.lock();
        state.batch_requests += 1;
        if state.fail_batch_calls || !state.batching_supported {
            return Err(RpcError::Network("batch request rejected by provider".into()));
        }
        calls.iter().map(|call| Self::lookup_call(&state, call)).collect()
    }

    fn supports_batch_calls(&self) -> bool {
        self.state.lock().batching_supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn batch_fails_as_a_whole() {
        let chain = MockChain::new();
        let known = ContractCall::new(Address::repeat_byte(1), vec![1, 2, 3, 4]);
        let unknown = ContractCall::new(Address::repeat_byte(2), vec![1, 2, 3, 4]);
        chain.set_call_result(known.clone(), U256::from(9u64));

        assert_eq!(chain.batch_call(&[known.clone()], None).await.unwrap(), vec![encode_uint(U256::from(9u64))]);
        assert!(chain.batch_call(&[known.clone(), unknown.clone()], None).await.is_err());
        assert!(chain.call(&unknown, Some(3)).await.is_err());
        assert_eq!(chain.call_blocks(), vec![Some(3)]);
    }

    #[tokio::test]
    async fn failing_blocks_error_independently() {
        let chain = MockChain::new();
        chain.add_block(1, 100);
        chain.add_block(2, 200);
        chain.fail_block(2);

        assert_eq!(chain.get_block(1).await.unwrap().timestamp, 100);
        assert!(chain.get_block(2).await.is_err());
        assert!(matches!(chain.get_block(3).await, Err(RpcError::NotFound(_))));
        assert_eq!(chain.block_requests(), vec![1, 2, 3]);
    }
}
