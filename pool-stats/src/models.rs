//! Data models for the indexer

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rpc_core::{Address, H256, U256};
use sp_math::decimal;
use crate::error::IndexerError;

/// Event stream with its own checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "SP_DEPOSIT_UPDATED")]
    DepositUpdated,
    #[serde(rename = "TRANSFER")]
    InterestMinted,
    #[serde(rename = "LIQUIDATION")]
    Liquidation,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::DepositUpdated, EventKind::InterestMinted, EventKind::Liquidation];

    /// Checkpoint key
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DepositUpdated => "SP_DEPOSIT_UPDATED",
            EventKind::InterestMinted => "TRANSFER",
            EventKind::Liquidation => "LIQUIDATION",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EventKind::DepositUpdated => "sp_deposit_events",
            EventKind::InterestMinted => "interest_rewards",
            EventKind::Liquidation => "liquidations",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IndexerError::InvalidInput(format!("unknown event kind: {}", s)))
    }
}

/// Inclusive block range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositUpdatedRecord {
    pub depositor: Address,
    pub new_deposit: U256,
    pub stashed_collateral: U256,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub transaction_hash: H256,
    pub log_index: u64,
    pub branch_id: u8,
    pub pool_address: Address,
}

/// Stablecoin minted into a stability pool as interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestRewardRecord {
    pub branch_id: u8,
    pub pool_address: Address,
    pub amount: U256,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub transaction_hash: H256,
    pub log_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationRecord {
    pub branch_id: u8,
    pub trove_manager: Address,
    pub debt_offset_by_sp: U256,
    pub debt_redistributed: U256,
    pub bold_gas_compensation: U256,
    pub coll_gas_compensation: U256,
    pub coll_sent_to_sp: U256,
    pub coll_redistributed: U256,
    pub coll_surplus: U256,
    pub l_eth: U256,
    pub l_bold_debt: U256,
    pub price: U256,
    pub block_number: u64,
    pub block_timestamp: Option<u64>,
    pub transaction_hash: H256,
    pub log_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    Deposit(DepositUpdatedRecord),
    Interest(InterestRewardRecord),
    Liquidation(LiquidationRecord),
}

impl EventRecord {
    pub fn kind(&self) -> EventKind {
        match self {
            EventRecord::Deposit(_) => EventKind::DepositUpdated,
            EventRecord::Interest(_) => EventKind::InterestMinted,
            EventRecord::Liquidation(_) => EventKind::Liquidation,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            EventRecord::Deposit(r) => r.block_number,
            EventRecord::Interest(r) => r.block_number,
            EventRecord::Liquidation(r) => r.block_number,
        }
    }

    pub fn block_timestamp(&self) -> Option<u64> {
        match self {
            EventRecord::Deposit(r) => r.block_timestamp,
            EventRecord::Interest(r) => r.block_timestamp,
            EventRecord::Liquidation(r) => r.block_timestamp,
        }
    }
}

/// Point-in-time pool totals, sampled out of band from the event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StabilityPoolSnapshot {
    pub branch_id: u8,
    pub pool_address: Address,
    #[serde(with = "decimal::u256")]
    pub total_deposits: U256,
    #[serde(with = "decimal::u256")]
    pub total_collateral: U256,
    pub block_number: u64,
    pub block_timestamp: u64,
}

/// One sampler invocation: every branch read at the same pinned block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotSample {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub pools: Vec<StabilityPoolSnapshot>,
    #[serde(with = "decimal::option_u256")]
    pub bold_supply: Option<U256>,
}

// ── Stored rows ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventQueryState {
    pub event_type: String,
    pub from_block: i64,
    pub to_block: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DepositEventRow {
    pub depositor: String,
    pub new_deposit: String,
    pub stashed_collateral: String,
    pub block_number: i64,
    pub block_timestamp: Option<i64>,
    pub transaction_hash: String,
    pub log_index: i64,
    pub branch_id: i64,
    pub pool_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnapshotRow {
    pub branch_id: i64,
    pub pool_address: String,
    pub total_deposits: String,
    pub total_collateral: String,
    pub block_number: i64,
    pub block_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BranchStatsRow {
    pub branch_id: i64,
    pub branch_name: String,
    pub sp_deposits: String,
    pub sp_apy: String,
    pub apy_avg: String,
    pub sp_apy_avg_1d: String,
    pub sp_apy_avg_7d: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRow {
    pub symbol: String,
    pub price: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GlobalStatsRow {
    pub total_bold_supply: String,
    pub total_debt_pending: String,
    pub total_coll_value: String,
    pub total_sp_deposits: String,
    pub total_value_locked: String,
    pub max_sp_apy: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CurrentDepositRow {
    pub depositor: String,
    pub branch_id: i64,
    pub amount: String,
    pub block_number: i64,
}

/// One row of the cross-kind event history
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventHistoryEntry {
    pub kind: String,
    pub branch_id: i64,
    pub contract_address: String,
    pub account: Option<String>,
    pub amount: String,
    pub block_number: i64,
    pub block_timestamp: Option<i64>,
    pub transaction_hash: String,
    pub log_index: i64,
}

// ── Derived state ────────────────────────────────────────────────

/// Partial update of a branch's current stats; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchStatsUpdate {
    pub sp_deposits: Option<U256>,
    pub sp_apy: Option<U256>,
    pub apy_avg: Option<U256>,
    pub sp_apy_avg_1d: Option<U256>,
    pub sp_apy_avg_7d: Option<U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    #[serde(with = "decimal::u256")]
    pub total_bold_supply: U256,
    #[serde(with = "decimal::u256")]
    pub total_debt_pending: U256,
    #[serde(with = "decimal::u256")]
    pub total_coll_value: U256,
    #[serde(with = "decimal::u256")]
    pub total_sp_deposits: U256,
    #[serde(with = "decimal::u256")]
    pub total_value_locked: U256,
    #[serde(with = "decimal::u256")]
    pub max_sp_apy: U256,
}

// ── Read API views ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchStatsView {
    pub branch_id: String,
    pub branch_name: String,
    pub sp_deposits: String,
    pub sp_apy: String,
    pub apy_avg: String,
    pub sp_apy_avg_1d: String,
    pub sp_apy_avg_7d: String,
    pub sp_apy_percent: String,
    pub apy_avg_percent: String,
    pub sp_apy_avg_1d_percent: String,
    pub sp_apy_avg_7d_percent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOverview {
    pub total_bold_supply: String,
    pub total_debt_pending: String,
    pub total_coll_value: String,
    pub total_sp_deposits: String,
    pub total_value_locked: String,
    pub max_sp_apy: String,
    pub created_at: DateTime<Utc>,
    pub branch: BTreeMap<String, BranchStatsView>,
    pub prices: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchDeposit {
    pub branch_id: u8,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityPoolDeposit {
    pub address: String,
    pub deposits: Vec<BranchDeposit>,
}

/// Filters for the event history listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub branch: Option<u8>,
    pub kind: Option<EventKind>,
    pub from_timestamp: Option<u64>,
    pub to_timestamp: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Render an address or hash as `0x`-prefixed lowercase hex.
pub fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds_parse_case_insensitively() {
        assert_eq!("transfer".parse::<EventKind>().unwrap(), EventKind::InterestMinted);
        assert_eq!("SP_DEPOSIT_UPDATED".parse::<EventKind>().unwrap(), EventKind::DepositUpdated);
        assert!("swap".parse::<EventKind>().is_err());
    }

    #[test]
    fn event_kind_serializes_as_checkpoint_key() {
        assert_eq!(serde_json::to_string(&EventKind::Liquidation).unwrap(), "\"LIQUIDATION\"");
    }
}
