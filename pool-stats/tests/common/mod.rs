#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;

use pool_stats::contracts::{
    event_signature, Branch, ContractSet, DEPOSIT_UPDATED_EVENT, LIQUIDATION_EVENT, TRANSFER_EVENT,
};
use pool_stats::database::Database;
use pool_stats::indexer::IndexerSettings;
use rpc_core::{address_topic, encode_uint, Address, MockChain, RawLog, H256, U256};

pub const ORIGIN_BLOCK: u64 = 100;
pub const HEAD: u64 = 450;
pub const CHUNK_SIZE: u64 = 100;

pub fn weth_pool() -> Address {
    Address::repeat_byte(0xa0)
}

pub fn wsteth_pool() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn weth_trove_manager() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn bold_token() -> Address {
    Address::repeat_byte(0xcc)
}

pub fn alice() -> Address {
    Address::repeat_byte(0x42)
}

pub fn bob() -> Address {
    Address::repeat_byte(0x43)
}

pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}

pub fn timestamp_of(block: u64) -> u64 {
    1_000_000 + block * 12
}

pub fn contracts() -> Arc<ContractSet> {
    Arc::new(ContractSet::new(
        vec![
            Branch {
                id: 0,
                symbol: "WETH".into(),
                stability_pool: weth_pool(),
                trove_manager: weth_trove_manager(),
            },
            Branch {
                id: 1,
                symbol: "wstETH".into(),
                stability_pool: wsteth_pool(),
                trove_manager: Address::repeat_byte(0xb1),
            },
        ],
        bold_token(),
    ))
}

pub fn settings() -> IndexerSettings {
    IndexerSettings {
        origin_block: ORIGIN_BLOCK,
        chunk_size: CHUNK_SIZE,
        timestamp_concurrency: 4,
    }
}

pub async fn open_database() -> (Arc<Database>, TempDir) {
    let dir = TempDir::new().unwrap();
    let database = Database::new(&dir.path().join("pool_stats.db")).await.unwrap();
    database.migrate().await.unwrap();
    (Arc::new(database), dir)
}

fn words(values: &[U256]) -> Vec<u8> {
    values.iter().flat_map(|v| encode_uint(*v)).collect()
}

fn tx_hash(block: u64, log_index: u64) -> Option<H256> {
    Some(H256::from_low_u64_be(block * 1_000 + log_index))
}

pub fn deposit_log(pool: Address, depositor: Address, amount: U256, block: u64, log_index: u64) -> RawLog {
    RawLog {
        address: pool,
        topics: vec![event_signature(DEPOSIT_UPDATED_EVENT), address_topic(depositor)],
        data: words(&[amount, U256::zero(), U256::one(), U256::zero(), U256::zero(), U256::zero()]),
        block_number: Some(block),
        transaction_hash: tx_hash(block, log_index),
        log_index: Some(log_index),
    }
}

pub fn transfer_log(from: Address, to: Address, amount: U256, block: u64, log_index: u64) -> RawLog {
    RawLog {
        address: bold_token(),
        topics: vec![event_signature(TRANSFER_EVENT), address_topic(from), address_topic(to)],
        data: words(&[amount]),
        block_number: Some(block),
        transaction_hash: tx_hash(block, log_index),
        log_index: Some(log_index),
    }
}

pub fn liquidation_log(trove_manager: Address, coll_sent: U256, price: U256, block: u64, log_index: u64) -> RawLog {
    let mut fields = vec![U256::from(1u64); 10];
    fields[4] = coll_sent;
    fields[9] = price;
    RawLog {
        address: trove_manager,
        topics: vec![event_signature(LIQUIDATION_EVENT)],
        data: words(&fields),
        block_number: Some(block),
        transaction_hash: tx_hash(block, log_index),
        log_index: Some(log_index),
    }
}

/// Chain at `HEAD` with deposits on both branches, two interest mints, one
/// WETH liquidation, and pool balances readable at the head.
pub fn seeded_chain() -> Arc<MockChain> {
    let chain = Arc::new(MockChain::new());
    let contracts = contracts();

    chain.set_head(HEAD);
    for block in [120, 250, 260, 300, 330, 410, HEAD] {
        chain.add_block(block, timestamp_of(block));
    }

    chain.push_log(deposit_log(weth_pool(), alice(), ether(1_000), 120, 0));
    chain.push_log(deposit_log(wsteth_pool(), bob(), ether(500), 250, 1));
    chain.push_log(deposit_log(weth_pool(), alice(), ether(700), 330, 0));

    chain.push_log(transfer_log(Address::zero(), weth_pool(), ether(30), 260, 2));
    chain.push_log(transfer_log(Address::zero(), wsteth_pool(), ether(10), 410, 0));
    // plain transfer into a pool, not a mint
    chain.push_log(transfer_log(alice(), weth_pool(), ether(99), 260, 3));

    chain.push_log(liquidation_log(weth_trove_manager(), U256::from(5u64), U256::from(2_000u64), 300, 3));

    let branches = contracts.branches();
    chain.set_call_result(branches[0].total_deposits_call(), ether(1_000));
    chain.set_call_result(branches[0].coll_balance_call(), ether(10));
    chain.set_call_result(branches[1].total_deposits_call(), ether(500));
    chain.set_call_result(branches[1].coll_balance_call(), ether(4));
    chain.set_call_result(contracts.bold_supply_call(), ether(9_000_000));

    chain
}
