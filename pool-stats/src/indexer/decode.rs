//! Raw log normalization
//!
//! Decoding never touches the network: records leave here with
//! `block_timestamp = None` and the scanner attaches timestamps afterwards.

use rpc_core::{decode_uint, topic_address, Address, LogFilter, RawLog, H256};
use tracing::warn;
use crate::contracts::*;
use crate::error::{IndexerError, Result};
use crate::models::*;

/// Log query for `kind` over the configured contracts within `[from_block, to_block]`.
pub fn log_filter(kind: EventKind, contracts: &ContractSet, from_block: u64, to_block: u64) -> LogFilter {
    match kind {
        EventKind::DepositUpdated => LogFilter::new(
            contracts.stability_pools(),
            event_signature(DEPOSIT_UPDATED_EVENT),
            from_block,
            to_block,
        ),
        EventKind::InterestMinted => LogFilter::new(
            vec![contracts.bold_token()],
            event_signature(TRANSFER_EVENT),
            from_block,
            to_block,
        )
        .with_topic(1, vec![rpc_core::address_topic(Address::zero())])
        .with_topic(2, contracts.stability_pools().into_iter().map(rpc_core::address_topic).collect()),
        EventKind::Liquidation => LogFilter::new(
            contracts.trove_managers(),
            event_signature(LIQUIDATION_EVENT),
            from_block,
            to_block,
        ),
    }
}

/// Decode every log, skipping (with a warning) the ones that cannot be attributed.
pub fn decode_logs(kind: EventKind, contracts: &ContractSet, logs: &[RawLog]) -> Vec<EventRecord> {
    logs.iter()
        .filter_map(|log| match decode_log(kind, contracts, log) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    kind = %kind,
                    block = ?log.block_number,
                    tx = ?log.transaction_hash,
                    error = %e,
                    "Skipping log"
                );
                None
            }
        })
        .collect()
}

pub fn decode_log(kind: EventKind, contracts: &ContractSet, log: &RawLog) -> Result<EventRecord> {
    let (block_number, transaction_hash, log_index) = log_position(log)?;

    match kind {
        EventKind::DepositUpdated => {
            let branch = contracts
                .branch_for_pool(&log.address)
                .ok_or_else(|| unresolved("stability pool", &log.address))?;
            Ok(EventRecord::Deposit(DepositUpdatedRecord {
                depositor: topic_address(indexed(log, 1)?),
                new_deposit: decode_uint(&log.data, 0)?,
                stashed_collateral: decode_uint(&log.data, 1)?,
                block_number,
                block_timestamp: None,
                transaction_hash,
                log_index,
                branch_id: branch.id,
                pool_address: branch.stability_pool,
            }))
        }
        EventKind::InterestMinted => {
            let from = topic_address(indexed(log, 1)?);
            if !from.is_zero() {
                return Err(IndexerError::Decode(format!("transfer from {:?} is not a mint", from)));
            }
            let to = topic_address(indexed(log, 2)?);
            let branch = contracts
                .branch_for_pool(&to)
                .ok_or_else(|| unresolved("stability pool", &to))?;
            Ok(EventRecord::Interest(InterestRewardRecord {
                branch_id: branch.id,
                pool_address: branch.stability_pool,
                amount: decode_uint(&log.data, 0)?,
                block_number,
                block_timestamp: None,
                transaction_hash,
                log_index,
            }))
        }
        EventKind::Liquidation => {
            let branch = contracts
                .branch_for_trove_manager(&log.address)
                .ok_or_else(|| unresolved("trove manager", &log.address))?;
            let word = |i| decode_uint(&log.data, i);
            Ok(EventRecord::Liquidation(LiquidationRecord {
                branch_id: branch.id,
                trove_manager: branch.trove_manager,
                debt_offset_by_sp: word(0)?,
                debt_redistributed: word(1)?,
                bold_gas_compensation: word(2)?,
                coll_gas_compensation: word(3)?,
                coll_sent_to_sp: word(4)?,
                coll_redistributed: word(5)?,
                coll_surplus: word(6)?,
                l_eth: word(7)?,
                l_bold_debt: word(8)?,
                price: word(9)?,
                block_number,
                block_timestamp: None,
                transaction_hash,
                log_index,
            }))
        }
    }
}

fn log_position(log: &RawLog) -> Result<(u64, H256, u64)> {
    match (log.block_number, log.transaction_hash, log.log_index) {
        (Some(block), Some(tx), Some(index)) => Ok((block, tx, index)),
        _ => Err(IndexerError::Decode("pending log without block position".into())),
    }
}

fn indexed(log: &RawLog, position: usize) -> Result<&H256> {
    log.topics
        .get(position)
        .ok_or_else(|| IndexerError::Decode(format!("missing indexed topic {}", position)))
}

fn unresolved(role: &str, address: &Address) -> IndexerError {
    IndexerError::Decode(format!("{:?} is not a configured {}", address, role))
}
