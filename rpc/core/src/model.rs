//! Chain data models shared by the indexer and its RPC backends

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use primitive_types::{H160, H256, U256};

pub type Address = H160;

/// RPC error type
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum RpcError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i32, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// The subset of a block header the indexer needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// An undecoded event log as returned by the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
    pub log_index: Option<u64>,
}

/// Log query: one event signature over a contract set within an inclusive block range.
///
/// `topics[i]` constrains indexed argument `i + 1`; `None` matches anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub event_signature: H256,
    pub topics: [Option<Vec<H256>>; 3],
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn new(addresses: Vec<Address>, event_signature: H256, from_block: u64, to_block: u64) -> Self {
        Self {
            addresses,
            event_signature,
            topics: [None, None, None],
            from_block,
            to_block,
        }
    }

    /// Constrain indexed argument `position` (1-based, 1..=3) to any of `values`.
    pub fn with_topic(mut self, position: usize, values: Vec<H256>) -> Self {
        if (1..=3).contains(&position) {
            self.topics[position - 1] = Some(values);
        }
        self
    }

    pub fn matches(&self, log: &RawLog) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        if log.topics.first() != Some(&self.event_signature) {
            return false;
        }
        match log.block_number {
            Some(n) if n >= self.from_block && n <= self.to_block => {}
            _ => return false,
        }
        self.topics.iter().enumerate().all(|(i, allowed)| match allowed {
            None => true,
            Some(values) => log.topics.get(i + 1).map_or(false, |t| values.contains(t)),
        })
    }
}

/// A read-only contract call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContractCall {
    pub target: Address,
    pub calldata: Vec<u8>,
}

impl ContractCall {
    pub fn new(target: Address, calldata: Vec<u8>) -> Self {
        Self { target, calldata }
    }
}

/// ABI-encode a single `uint256` return word.
pub fn encode_uint(value: U256) -> Vec<u8> {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word.to_vec()
}

/// Decode the `index`-th 32-byte word of ABI data as `uint256`.
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, RpcError> {
    let start = index * 32;
    data.get(start..start + 32)
        .map(U256::from_big_endian)
        .ok_or_else(|| RpcError::Decode(format!(
            "word {} out of bounds for {} bytes of data (0x{})",
            index,
            data.len(),
            hex::encode(data)
        )))
}

/// Left-pad an address into a 32-byte topic.
pub fn address_topic(address: Address) -> H256 {
    let mut topic = [0u8; 32];
    topic[12..].copy_from_slice(address.as_bytes());
    H256::from(topic)
}

/// Extract the address stored in a 32-byte topic.
pub fn topic_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at(address: Address, block: u64, topics: Vec<H256>) -> RawLog {
        RawLog {
            address,
            topics,
            data: vec![],
            block_number: Some(block),
            transaction_hash: Some(H256::repeat_byte(1)),
            log_index: Some(0),
        }
    }

    #[test]
    fn filter_matches_address_signature_and_range() {
        let sig = H256::repeat_byte(0xaa);
        let pool = Address::repeat_byte(0x11);
        let filter = LogFilter::new(vec![pool], sig, 10, 20);

        assert!(filter.matches(&log_at(pool, 10, vec![sig])));
        assert!(filter.matches(&log_at(pool, 20, vec![sig])));
        assert!(!filter.matches(&log_at(pool, 21, vec![sig])));
        assert!(!filter.matches(&log_at(pool, 9, vec![sig])));
        assert!(!filter.matches(&log_at(Address::repeat_byte(0x22), 15, vec![sig])));
        assert!(!filter.matches(&log_at(pool, 15, vec![H256::zero()])));
    }

    #[test]
    fn filter_applies_indexed_topics() {
        let sig = H256::repeat_byte(0xaa);
        let pool = Address::repeat_byte(0x11);
        let filter = LogFilter::new(vec![], sig, 0, 100)
            .with_topic(1, vec![address_topic(Address::zero())])
            .with_topic(2, vec![address_topic(pool)]);

        let mint = log_at(Address::repeat_byte(0x99), 5, vec![sig, address_topic(Address::zero()), address_topic(pool)]);
        let transfer = log_at(Address::repeat_byte(0x99), 5, vec![sig, address_topic(pool), address_topic(pool)]);
        assert!(filter.matches(&mint));
        assert!(!filter.matches(&transfer));
    }

    #[test]
    fn uint_words_round_trip() {
        let mut data = encode_uint(U256::from(7u64));
        data.extend(encode_uint(U256::MAX));
        assert_eq!(decode_uint(&data, 0).unwrap(), U256::from(7u64));
        assert_eq!(decode_uint(&data, 1).unwrap(), U256::MAX);
        assert!(decode_uint(&data, 2).is_err());
    }

    #[test]
    fn address_topics_round_trip() {
        let address = Address::repeat_byte(0x42);
        assert_eq!(topic_address(&address_topic(address)), address);
    }
}
