mod common;

use std::sync::Arc;

use common::*;
use pool_stats::api::StatsApi;
use pool_stats::apy::{BranchSelector, StatsRefresher};
use pool_stats::database::queries::PriceQueries;
use pool_stats::database::Database;
use pool_stats::indexer::IndexerService;
use rpc_core::U256;
use tempfile::TempDir;

async fn synced() -> (Arc<Database>, TempDir) {
    let (database, dir) = open_database().await;
    IndexerService::new(database.clone(), seeded_chain(), contracts(), settings())
        .run_cycle()
        .await
        .unwrap();
    (database, dir)
}

#[tokio::test]
async fn branch_apy_is_exact() {
    let (database, _dir) = synced().await;
    let api = StatsApi::new(database);

    let weth = api
        .calculate_apy(BranchSelector::Branch(0), timestamp_of(ORIGIN_BLOCK), timestamp_of(HEAD))
        .await
        .unwrap();
    // (30e18 interest + 5 * 2000 liquidation value) * 1e18 / 1000e18
    assert_eq!(weth.apy_raw, U256::from(3u64) * U256::exp10(16) + U256::from(10u64));
    assert_eq!(weth.apy_percent, "3.00");
    assert_eq!(weth.breakdown.interest_events, 1);
    assert_eq!(weth.breakdown.liquidation_events, 1);
    assert_eq!(weth.breakdown.snapshots, 1);

    let wsteth = api
        .calculate_apy(BranchSelector::Branch(1), timestamp_of(ORIGIN_BLOCK), timestamp_of(HEAD))
        .await
        .unwrap();
    // the WETH liquidation is protocol-wide: 10000 * 1e18 / 500e18 adds 20
    assert_eq!(wsteth.apy_raw, U256::from(2u64) * U256::exp10(16) + U256::from(20u64));
    assert_eq!(wsteth.breakdown.liquidation_events, 1);
}

#[tokio::test]
async fn all_branches_average_snapshot_deposits() {
    let (database, _dir) = synced().await;
    let api = StatsApi::new(database);

    let all = api
        .calculate_apy(BranchSelector::All, timestamp_of(ORIGIN_BLOCK), timestamp_of(HEAD))
        .await
        .unwrap();
    let expected = (ether(40) + U256::from(10_000u64)) * U256::exp10(18) / ether(750);
    assert_eq!(all.apy_raw, expected);
    assert_eq!(all.apy_percent, "5.33");
    assert_eq!(all.breakdown.snapshots, 2);
}

#[tokio::test]
async fn window_bounds_select_events() {
    let (database, _dir) = synced().await;
    let api = StatsApi::new(database);

    // starts after the WETH mint at block 260, still covers the liquidation at 300
    let late = api
        .calculate_apy(BranchSelector::Branch(0), timestamp_of(270), timestamp_of(HEAD))
        .await
        .unwrap();
    assert_eq!(late.breakdown.interest_events, 0);
    assert_eq!(late.apy_raw, U256::from(10u64));

    // ends before the snapshot, so there are no deposits to divide by
    let early = api
        .calculate_apy(BranchSelector::Branch(0), timestamp_of(ORIGIN_BLOCK), timestamp_of(400))
        .await
        .unwrap();
    assert_eq!(early.breakdown.snapshots, 0);
    assert_eq!(early.apy_raw, U256::zero());
    assert_eq!(early.apy_percent, "0.00");

    assert!(api.calculate_apy(BranchSelector::All, 10, 5).await.is_err());
}

#[tokio::test]
async fn refresh_materializes_branch_and_global_stats() {
    let (database, _dir) = synced().await;
    let refresher = StatsRefresher::new(database.clone(), contracts());

    let global = refresher.refresh(timestamp_of(HEAD)).await.unwrap();
    let weth_apy = U256::from(3u64) * U256::exp10(16) + U256::from(10u64);

    assert_eq!(global.total_sp_deposits, ether(1_500));
    // 10e18 collateral at a raw price of 2000, descaled by 1e18
    assert_eq!(global.total_coll_value, U256::from(20_000u64));
    assert_eq!(global.total_value_locked, ether(1_500) + U256::from(20_000u64));
    assert_eq!(global.total_bold_supply, ether(9_000_000));
    assert_eq!(global.max_sp_apy, weth_apy);

    let price = PriceQueries::get(database.pool(), "WETH").await.unwrap().unwrap();
    assert_eq!(price.price, "2000");

    let api = StatsApi::new(database);
    let branches = api.latest_branch_stats().await.unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0].branch_name, "WETH");
    assert_eq!(branches[0].sp_deposits, ether(1_000).to_string());
    assert_eq!(branches[0].sp_apy, weth_apy.to_string());
    assert_eq!(branches[0].sp_apy_avg_1d_percent, "3.00");
    assert_eq!(branches[1].sp_apy_percent, "2.00");

    let stats = api.latest_stats(1).await.unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].max_sp_apy, weth_apy.to_string());
    assert_eq!(stats[0].prices["WETH"], "2000");
    assert_eq!(stats[0].branch["wstETH"].branch_id, "1");
}

#[tokio::test]
async fn refresh_appends_a_global_row_each_time() {
    let (database, _dir) = synced().await;
    let refresher = StatsRefresher::new(database.clone(), contracts());

    refresher.refresh(timestamp_of(HEAD)).await.unwrap();
    refresher.refresh(timestamp_of(HEAD) + 60).await.unwrap();

    let stats = StatsApi::new(database).latest_stats(10).await.unwrap();
    assert_eq!(stats.len(), 2);
}
