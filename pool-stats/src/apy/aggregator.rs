//! APY over a branch and timestamp window, read purely from stored history

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use rpc_core::U256;
use sp_math::{compute_yield, decimal, format_percentage, parse_amount, YieldFigures};
use tracing::debug;
use crate::database::queries::{EventQueries, SnapshotQueries};
use crate::database::Database;
use crate::error::{IndexerError, Result};

/// A single branch, or every branch at once. Serialized as `"all"` or the branch id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSelector {
    All,
    Branch(u8),
}

impl BranchSelector {
    pub fn branch_id(&self) -> Option<u8> {
        match self {
            BranchSelector::All => None,
            BranchSelector::Branch(id) => Some(*id),
        }
    }
}

impl fmt::Display for BranchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchSelector::All => f.write_str("all"),
            BranchSelector::Branch(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for BranchSelector {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(BranchSelector::All);
        }
        s.parse::<u8>()
            .map(BranchSelector::Branch)
            .map_err(|_| IndexerError::InvalidInput(format!("branch must be an id or `all`, got {:?}", s)))
    }
}

impl Serialize for BranchSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BranchSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyBreakdown {
    #[serde(flatten)]
    pub figures: YieldFigures,
    pub interest_events: usize,
    pub liquidation_events: usize,
    pub snapshots: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApyCalculation {
    pub branch: BranchSelector,
    pub from_timestamp: u64,
    pub to_timestamp: u64,
    #[serde(with = "decimal::u256")]
    pub apy_raw: U256,
    pub apy_percent: String,
    pub breakdown: ApyBreakdown,
}

pub struct YieldAggregator {
    database: Arc<Database>,
}

impl YieldAggregator {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Yield for `branch` over the inclusive window `[from_ts, to_ts]`.
    ///
    /// Interest mints of the selected branch and protocol-wide liquidation gains are
    /// summed, deposits are the mean of the branch's snapshots inside the window.
    /// Rows without a timestamp never match.
    pub async fn calculate_apy(&self, branch: BranchSelector, from_ts: u64, to_ts: u64) -> Result<ApyCalculation> {
        if from_ts > to_ts {
            return Err(IndexerError::InvalidInput(format!(
                "window start {} is after its end {}",
                from_ts, to_ts
            )));
        }
        let pool = self.database.pool();
        let branch_id = branch.branch_id();

        let interest = EventQueries::interest_amounts(pool, branch_id, from_ts, to_ts)
            .await?
            .iter()
            .map(|a| parse_amount(a))
            .collect::<sp_math::MathResult<Vec<_>>>()?;

        let liquidations = EventQueries::liquidation_gains(pool, from_ts, to_ts)
            .await?
            .iter()
            .map(|(coll, price)| -> sp_math::MathResult<(U256, U256)> {
                Ok((parse_amount(coll)?, parse_amount(price)?))
            })
            .collect::<sp_math::MathResult<Vec<_>>>()?;

        let deposits = SnapshotQueries::deposits_in_range(pool, branch_id, from_ts, to_ts)
            .await?
            .iter()
            .map(|d| parse_amount(d))
            .collect::<sp_math::MathResult<Vec<_>>>()?;

        let figures = compute_yield(&interest, &liquidations, &deposits)?;

        debug!(
            branch = %branch,
            from_ts,
            to_ts,
            interest = interest.len(),
            liquidations = liquidations.len(),
            snapshots = deposits.len(),
            apy_raw = %figures.apy_raw,
            "APY calculated"
        );

        Ok(ApyCalculation {
            branch,
            from_timestamp: from_ts,
            to_timestamp: to_ts,
            apy_raw: figures.apy_raw,
            apy_percent: format_percentage(figures.apy_raw),
            breakdown: ApyBreakdown {
                figures,
                interest_events: interest.len(),
                liquidation_events: liquidations.len(),
                snapshots: deposits.len(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::tests::test_database;
    use crate::models::*;
    use rpc_core::{Address, H256};

    async fn seed(db: &Database) {
        let mut conn = db.pool().acquire().await.unwrap();
        let rewards = [(0u8, 1_000_000u64, 100u64), (1, 500, 150), (0, 9_999, 5_000)];
        for (i, (branch_id, amount, ts)) in rewards.into_iter().enumerate() {
            EventQueries::insert_interest(&mut conn, &InterestRewardRecord {
                branch_id,
                pool_address: Address::repeat_byte(0xa0 + branch_id),
                amount: U256::from(amount),
                block_number: ts / 10,
                block_timestamp: Some(ts),
                transaction_hash: H256::from_low_u64_be(i as u64 + 1),
                log_index: 0,
            })
            .await
            .unwrap();
        }
        for (branch_id, deposits, block, ts) in [(0u8, 50_000_000u64, 10u64, 100u64), (0, 150_000_000, 20, 200), (1, 10, 20, 200)] {
            SnapshotQueries::insert(&mut conn, &StabilityPoolSnapshot {
                branch_id,
                pool_address: Address::repeat_byte(0xa0 + branch_id),
                total_deposits: U256::from(deposits),
                total_collateral: U256::zero(),
                block_number: block,
                block_timestamp: ts,
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn branch_window_is_exact() {
        let (db, _dir) = test_database().await;
        seed(&db).await;
        let aggregator = YieldAggregator::new(Arc::new(db));

        let result = aggregator.calculate_apy(BranchSelector::Branch(0), 0, 1_000).await.unwrap();

        assert_eq!(result.apy_raw, U256::exp10(16));
        assert_eq!(result.apy_percent, "1.00");
        assert_eq!(result.breakdown.interest_events, 1);
        assert_eq!(result.breakdown.snapshots, 2);
        assert_eq!(result.breakdown.figures.avg_deposits, U256::from(100_000_000u64));
    }

    #[tokio::test]
    async fn all_branches_pool_everything() {
        let (db, _dir) = test_database().await;
        seed(&db).await;
        let aggregator = YieldAggregator::new(Arc::new(db));

        let result = aggregator.calculate_apy(BranchSelector::All, 0, 1_000).await.unwrap();
        assert_eq!(result.breakdown.interest_events, 2);
        assert_eq!(result.breakdown.snapshots, 3);
    }

    #[tokio::test]
    async fn window_without_snapshots_is_zero() {
        let (db, _dir) = test_database().await;
        seed(&db).await;
        let aggregator = YieldAggregator::new(Arc::new(db));

        let result = aggregator.calculate_apy(BranchSelector::Branch(0), 4_000, 6_000).await.unwrap();
        assert_eq!(result.breakdown.interest_events, 1);
        assert_eq!(result.apy_raw, U256::zero());
        assert_eq!(result.apy_percent, "0.00");
    }

    #[tokio::test]
    async fn liquidations_count_for_every_branch() {
        let (db, _dir) = test_database().await;
        seed(&db).await;
        let mut conn = db.pool().acquire().await.unwrap();
        EventQueries::insert_liquidation(&mut conn, &LiquidationRecord {
            branch_id: 1,
            trove_manager: Address::repeat_byte(0xb1),
            debt_offset_by_sp: U256::zero(),
            debt_redistributed: U256::zero(),
            bold_gas_compensation: U256::zero(),
            coll_gas_compensation: U256::zero(),
            coll_sent_to_sp: U256::from(2u64),
            coll_redistributed: U256::zero(),
            coll_surplus: U256::zero(),
            l_eth: U256::zero(),
            l_bold_debt: U256::zero(),
            price: U256::from(500_000u64),
            block_number: 15,
            block_timestamp: Some(150),
            transaction_hash: H256::from_low_u64_be(99),
            log_index: 0,
        })
        .await
        .unwrap();
        drop(conn);
        let aggregator = YieldAggregator::new(Arc::new(db));

        // branch 0 interest 1_000_000 plus the branch 1 liquidation worth 2 * 500_000
        let result = aggregator.calculate_apy(BranchSelector::Branch(0), 0, 1_000).await.unwrap();
        assert_eq!(result.breakdown.liquidation_events, 1);
        assert_eq!(result.breakdown.figures.total_liquidation_value, sp_math::widen(U256::from(1_000_000u64)));
        assert_eq!(result.apy_raw, U256::from(2u64) * U256::exp10(16));
    }

    #[tokio::test]
    async fn window_end_past_i64_range_still_matches() {
        let (db, _dir) = test_database().await;
        seed(&db).await;
        let aggregator = YieldAggregator::new(Arc::new(db));

        let bounded = aggregator.calculate_apy(BranchSelector::All, 0, i64::MAX as u64).await.unwrap();
        let unbounded = aggregator.calculate_apy(BranchSelector::All, 0, u64::MAX).await.unwrap();
        assert_eq!(unbounded.breakdown.interest_events, 3);
        assert_eq!(unbounded.breakdown.snapshots, 3);
        assert_eq!(unbounded.apy_raw, bounded.apy_raw);
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let (db, _dir) = test_database().await;
        let aggregator = YieldAggregator::new(Arc::new(db));
        assert!(matches!(
            aggregator.calculate_apy(BranchSelector::All, 10, 5).await,
            Err(IndexerError::InvalidInput(_))
        ));
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("all".parse::<BranchSelector>().unwrap(), BranchSelector::All);
        assert_eq!("2".parse::<BranchSelector>().unwrap(), BranchSelector::Branch(2));
        assert!("-1".parse::<BranchSelector>().is_err());
    }
}
