//! Current deposits as a fold over the deposit-update ledger

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use crate::database::queries::{DepositQueries, EventQueries};
use crate::database::Database;
use crate::error::Result;
use crate::models::*;

/// Newest balance per `(depositor, branch)`. Input must be in chain order.
pub fn fold_deposits(events: &[DepositEventRow]) -> Vec<CurrentDepositRow> {
    let mut latest: BTreeMap<(String, i64), (String, i64)> = BTreeMap::new();
    for event in events {
        latest.insert(
            (event.depositor.clone(), event.branch_id),
            (event.new_deposit.clone(), event.block_number),
        );
    }
    latest
        .into_iter()
        .map(|((depositor, branch_id), (amount, block_number))| CurrentDepositRow {
            depositor,
            branch_id,
            amount,
            block_number,
        })
        .collect()
}

/// Group non-zero balances by depositor.
pub fn group_by_depositor(rows: Vec<CurrentDepositRow>) -> Vec<StabilityPoolDeposit> {
    let mut grouped: BTreeMap<String, Vec<BranchDeposit>> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| r.amount != "0") {
        grouped.entry(row.depositor).or_default().push(BranchDeposit {
            branch_id: row.branch_id as u8,
            amount: row.amount,
        });
    }
    grouped
        .into_iter()
        .map(|(address, deposits)| StabilityPoolDeposit { address, deposits })
        .collect()
}

pub struct DepositLedger {
    database: Arc<Database>,
}

impl DepositLedger {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Recompute `current_deposits` from the stored event history.
    pub async fn rebuild(&self) -> Result<usize> {
        let events = EventQueries::deposit_events_in_order(self.database.pool()).await?;
        let current = fold_deposits(&events);
        DepositQueries::replace_all(self.database.pool(), &current).await?;
        info!(events = events.len(), depositors = current.len(), "Deposit ledger rebuilt");
        Ok(current.len())
    }

    pub async fn stability_pool_deposits(&self) -> Result<Vec<StabilityPoolDeposit>> {
        let rows = DepositQueries::list_nonzero(self.database.pool()).await?;
        Ok(group_by_depositor(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(depositor: &str, branch_id: i64, amount: &str, block_number: i64) -> DepositEventRow {
        DepositEventRow {
            depositor: depositor.into(),
            new_deposit: amount.into(),
            stashed_collateral: "0".into(),
            block_number,
            block_timestamp: None,
            transaction_hash: format!("0x{:064x}", block_number),
            log_index: 0,
            branch_id,
            pool_address: "0xpool".into(),
        }
    }

    #[test]
    fn newest_update_wins_per_branch() {
        let events = vec![
            event("0xaa", 0, "100", 1),
            event("0xaa", 1, "7", 2),
            event("0xbb", 0, "50", 3),
            event("0xaa", 0, "40", 4),
            event("0xbb", 0, "0", 5),
        ];

        let current = fold_deposits(&events);
        assert_eq!(current.len(), 3);
        let aa0 = current.iter().find(|r| r.depositor == "0xaa" && r.branch_id == 0).unwrap();
        assert_eq!(aa0.amount, "40");
        assert_eq!(aa0.block_number, 4);

        let grouped = group_by_depositor(current);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].address, "0xaa");
        assert_eq!(grouped[0].deposits.len(), 2);
    }

    #[test]
    fn empty_ledger_folds_to_nothing() {
        assert!(fold_deposits(&[]).is_empty());
    }
}
