//! JSON-RPC chain client backed by an ethers HTTP provider

use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError as _};
use ethers::types::{
    transaction::eip2718::TypedTransaction, BlockId, BlockNumber, Bytes, Filter, Log,
    TransactionRequest, ValueOrArray, H160 as EthAddress, H256 as EthHash,
};
use ethers::utils::id;
use rpc_core::{Address, BlockInfo, ChainApi, ContractCall, LogFilter, RawLog, RpcError, H256};
use tracing::debug;

const AGGREGATE3: &str = "aggregate3((address,bool,bytes)[])";

pub struct RpcClient {
    provider: Provider<Http>,
    multicall: Option<Address>,
}

impl RpcClient {
    pub fn new(url: &str, multicall: Option<Address>) -> Result<Self, RpcError> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| RpcError::Internal(format!("Invalid RPC URL {}: {}", url, e)))?;
        Ok(Self { provider, multicall })
    }

    fn block_id(block: Option<u64>) -> Option<BlockId> {
        block.map(|n| BlockId::Number(BlockNumber::Number(n.into())))
    }

    fn transaction(target: Address, calldata: Vec<u8>) -> TypedTransaction {
        TransactionRequest::new()
            .to(to_eth_address(target))
            .data(Bytes::from(calldata))
            .into()
    }
}

/// `aggregate3` calldata with `allowFailure = false`, so one revert fails the whole batch.
pub fn encode_aggregate3(calls: &[ContractCall]) -> Vec<u8> {
    let entries = calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(to_eth_address(call.target)),
                Token::Bool(false),
                Token::Bytes(call.calldata.clone()),
            ])
        })
        .collect();

    let mut calldata = id(AGGREGATE3).to_vec();
    calldata.extend(abi::encode(&[Token::Array(entries)]));
    calldata
}

/// Return data of each inner call, failing if any of them did not succeed.
pub fn decode_aggregate3(data: &[u8]) -> Result<Vec<Vec<u8>>, RpcError> {
    let result_type = ParamType::Array(Box::new(ParamType::Tuple(vec![ParamType::Bool, ParamType::Bytes])));
    let mut tokens = abi::decode(&[result_type], data)
        .map_err(|e| RpcError::Decode(format!("aggregate3 result: {}", e)))?;

    let results = match tokens.pop() {
        Some(Token::Array(results)) => results,
        other => return Err(RpcError::Decode(format!("unexpected aggregate3 result {:?}", other))),
    };

    results
        .into_iter()
        .enumerate()
        .map(|(i, token)| match token {
            Token::Tuple(fields) => match fields.as_slice() {
                [Token::Bool(true), Token::Bytes(bytes)] => Ok(bytes.clone()),
                [Token::Bool(false), _] => Err(RpcError::Rpc { code: 3, message: format!("call {} in batch reverted", i) }),
                _ => Err(RpcError::Decode(format!("malformed aggregate3 entry {}", i))),
            },
            _ => Err(RpcError::Decode(format!("malformed aggregate3 entry {}", i))),
        })
        .collect()
}

fn to_eth_address(address: Address) -> EthAddress {
    EthAddress::from_slice(address.as_bytes())
}

fn to_eth_hash(hash: &H256) -> EthHash {
    EthHash::from_slice(hash.as_bytes())
}

fn from_eth_log(log: Log) -> RawLog {
    RawLog {
        address: Address::from_slice(log.address.as_bytes()),
        topics: log.topics.iter().map(|t| H256::from_slice(t.as_bytes())).collect(),
        data: log.data.to_vec(),
        block_number: log.block_number.map(|n| n.as_u64()),
        transaction_hash: log.transaction_hash.map(|h| H256::from_slice(h.as_bytes())),
        log_index: log.log_index.map(|i| i.low_u64()),
    }
}

fn map_provider_error(err: ProviderError) -> RpcError {
    if let Some(response) = err.as_error_response() {
        return RpcError::Rpc {
            code: response.code as i32,
            message: response.message.clone(),
        };
    }
    match err {
        ProviderError::HTTPError(e) => RpcError::Network(e.to_string()),
        ProviderError::SerdeJson(e) => RpcError::Decode(e.to_string()),
        other => RpcError::Internal(other.to_string()),
    }
}

#[async_trait]
impl ChainApi for RpcClient {
    async fn current_block_height(&self) -> Result<u64, RpcError> {
        let number = self.provider.get_block_number().await.map_err(map_provider_error)?;
        Ok(number.as_u64())
    }

    async fn get_block(&self, number: u64) -> Result<BlockInfo, RpcError> {
        let block = self
            .provider
            .get_block(BlockId::Number(BlockNumber::Number(number.into())))
            .await
            .map_err(map_provider_error)?
            .ok_or_else(|| RpcError::NotFound(format!("block {}", number)))?;

        Ok(BlockInfo {
            number,
            timestamp: block.timestamp.low_u64(),
        })
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, RpcError> {
        let mut query = Filter::new()
            .address(ValueOrArray::Array(filter.addresses.iter().copied().map(to_eth_address).collect()))
            .topic0(ValueOrArray::Value(Some(to_eth_hash(&filter.event_signature))))
            .from_block(filter.from_block)
            .to_block(filter.to_block);

        for (i, values) in filter.topics.iter().enumerate() {
            let Some(values) = values else { continue };
            let topic = ValueOrArray::Array(values.iter().map(|v| Some(to_eth_hash(v))).collect());
            query = match i {
                0 => query.topic1(topic),
                1 => query.topic2(topic),
                _ => query.topic3(topic),
            };
        }

        let logs = self.provider.get_logs(&query).await.map_err(map_provider_error)?;
        debug!(from_block = filter.from_block, to_block = filter.to_block, logs = logs.len(), "eth_getLogs");
        Ok(logs.into_iter().map(from_eth_log).collect())
    }

    async fn call(&self, call: &ContractCall, block: Option<u64>) -> Result<Vec<u8>, RpcError> {
        let tx = Self::transaction(call.target, call.calldata.clone());
        let result = self
            .provider
            .call(&tx, Self::block_id(block))
            .await
            .map_err(map_provider_error)?;
        Ok(result.to_vec())
    }

    async fn batch_call(&self, calls: &[ContractCall], block: Option<u64>) -> Result<Vec<Vec<u8>>, RpcError> {
        let multicall = self
            .multicall
            .ok_or_else(|| RpcError::Unsupported("no multicall contract configured".into()))?;

        let tx = Self::transaction(multicall, encode_aggregate3(calls));
        let result = self
            .provider
            .call(&tx, Self::block_id(block))
            .await
            .map_err(map_provider_error)?;

        let results = decode_aggregate3(&result)?;
        if results.len() != calls.len() {
            return Err(RpcError::Decode(format!(
                "aggregate3 returned {} results for {} calls",
                results.len(),
                calls.len()
            )));
        }
        Ok(results)
    }

    fn supports_batch_calls(&self) -> bool {
        self.multicall.is_some()
    }
}
