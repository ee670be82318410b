//! Database query functions

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use rpc_core::U256;
use crate::error::Result;
use crate::models::*;

pub struct CheckpointQueries;

impl CheckpointQueries {
    pub async fn get(pool: &SqlitePool, kind: EventKind) -> Result<Option<EventQueryState>> {
        let state = sqlx::query_as::<_, EventQueryState>(
            r#"
            SELECT event_type, from_block, to_block, updated_at
            FROM event_query_state
            WHERE event_type = ?
            "#,
        )
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await?;

        Ok(state)
    }

    /// Upsert the high-water mark; a lower `to_block` than the stored one is ignored.
    pub async fn advance(pool: &SqlitePool, kind: EventKind, from_block: u64, to_block: u64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_query_state (event_type, from_block, to_block, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (event_type) DO UPDATE SET
                from_block = excluded.from_block,
                to_block = excluded.to_block,
                updated_at = excluded.updated_at
            WHERE excluded.to_block >= event_query_state.to_block
            "#,
        )
        .bind(kind.as_str())
        .bind(from_block as i64)
        .bind(to_block as i64)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<EventQueryState>> {
        let states = sqlx::query_as::<_, EventQueryState>(
            "SELECT event_type, from_block, to_block, updated_at FROM event_query_state ORDER BY event_type",
        )
        .fetch_all(pool)
        .await?;

        Ok(states)
    }
}

pub struct EventQueries;

impl EventQueries {
    /// Returns `false` when the `(transaction_hash, log_index)` row already exists.
    pub async fn insert_deposit(conn: &mut SqliteConnection, record: &DepositUpdatedRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sp_deposit_events (
                depositor, new_deposit, stashed_collateral, block_number, block_timestamp,
                transaction_hash, log_index, branch_id, pool_address
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (transaction_hash, log_index) DO NOTHING
            "#,
        )
        .bind(hex_string(record.depositor.as_bytes()))
        .bind(record.new_deposit.to_string())
        .bind(record.stashed_collateral.to_string())
        .bind(record.block_number as i64)
        .bind(record.block_timestamp.map(|t| t as i64))
        .bind(hex_string(record.transaction_hash.as_bytes()))
        .bind(record.log_index as i64)
        .bind(record.branch_id as i64)
        .bind(hex_string(record.pool_address.as_bytes()))
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_interest(conn: &mut SqliteConnection, record: &InterestRewardRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO interest_rewards (
                branch_id, pool_address, amount, block_number, block_timestamp,
                transaction_hash, log_index
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (transaction_hash, log_index) DO NOTHING
            "#,
        )
        .bind(record.branch_id as i64)
        .bind(hex_string(record.pool_address.as_bytes()))
        .bind(record.amount.to_string())
        .bind(record.block_number as i64)
        .bind(record.block_timestamp.map(|t| t as i64))
        .bind(hex_string(record.transaction_hash.as_bytes()))
        .bind(record.log_index as i64)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_liquidation(conn: &mut SqliteConnection, record: &LiquidationRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO liquidations (
                branch_id, trove_manager, debt_offset_by_sp, debt_redistributed,
                bold_gas_compensation, coll_gas_compensation, coll_sent_to_sp,
                coll_redistributed, coll_surplus, l_eth, l_bold_debt, price,
                block_number, block_timestamp, transaction_hash, log_index
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (transaction_hash, log_index) DO NOTHING
            "#,
        )
        .bind(record.branch_id as i64)
        .bind(hex_string(record.trove_manager.as_bytes()))
        .bind(record.debt_offset_by_sp.to_string())
        .bind(record.debt_redistributed.to_string())
        .bind(record.bold_gas_compensation.to_string())
        .bind(record.coll_gas_compensation.to_string())
        .bind(record.coll_sent_to_sp.to_string())
        .bind(record.coll_redistributed.to_string())
        .bind(record.coll_surplus.to_string())
        .bind(record.l_eth.to_string())
        .bind(record.l_bold_debt.to_string())
        .bind(record.price.to_string())
        .bind(record.block_number as i64)
        .bind(record.block_timestamp.map(|t| t as i64))
        .bind(hex_string(record.transaction_hash.as_bytes()))
        .bind(record.log_index as i64)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &SqlitePool, kind: EventKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count)
    }

    /// Distinct block numbers whose rows still lack a usable timestamp.
    pub async fn blocks_missing_timestamp(pool: &SqlitePool, kind: EventKind) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT DISTINCT block_number FROM {} WHERE block_timestamp IS NULL OR block_timestamp = 0 ORDER BY block_number",
            kind.table()
        );
        let blocks: Vec<i64> = sqlx::query_scalar(&sql).fetch_all(pool).await?;
        Ok(blocks)
    }

    pub async fn set_block_timestamp(pool: &SqlitePool, kind: EventKind, block_number: u64, timestamp: u64) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET block_timestamp = ? WHERE block_number = ? AND (block_timestamp IS NULL OR block_timestamp = 0)",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(timestamp as i64)
            .bind(block_number as i64)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Every deposit update in chain order, the input of the ledger fold.
    pub async fn deposit_events_in_order(pool: &SqlitePool) -> Result<Vec<DepositEventRow>> {
        let rows = sqlx::query_as::<_, DepositEventRow>(
            r#"
            SELECT depositor, new_deposit, stashed_collateral, block_number, block_timestamp,
                   transaction_hash, log_index, branch_id, pool_address
            FROM sp_deposit_events
            ORDER BY block_number ASC, log_index ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn interest_amounts(pool: &SqlitePool, branch: Option<u8>, from_ts: u64, to_ts: u64) -> Result<Vec<String>> {
        let branch = branch.map(i64::from);
        let amounts: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT amount FROM interest_rewards
            WHERE block_timestamp >= ? AND block_timestamp <= ?
              AND (? IS NULL OR branch_id = ?)
            ORDER BY block_number, log_index
            "#,
        )
        .bind(sql_timestamp(from_ts))
        .bind(sql_timestamp(to_ts))
        .bind(branch)
        .bind(branch)
        .fetch_all(pool)
        .await?;

        Ok(amounts)
    }

    /// `(coll_sent_to_sp, price)` pairs of every liquidation inside the window.
    ///
    /// Liquidations are protocol-wide: every branch selector sees all of them.
    pub async fn liquidation_gains(pool: &SqlitePool, from_ts: u64, to_ts: u64) -> Result<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT coll_sent_to_sp, price FROM liquidations
            WHERE block_timestamp >= ? AND block_timestamp <= ?
            ORDER BY block_number, log_index
            "#,
        )
        .bind(sql_timestamp(from_ts))
        .bind(sql_timestamp(to_ts))
        .fetch_all(pool)
        .await?;

        Ok(pairs)
    }

    pub async fn latest_liquidation_price(conn: &mut SqliteConnection, branch_id: u8) -> Result<Option<String>> {
        let price: Option<String> = sqlx::query_scalar(
            r#"
            SELECT price FROM liquidations
            WHERE branch_id = ?
            ORDER BY block_number DESC, log_index DESC
            LIMIT 1
            "#,
        )
        .bind(branch_id as i64)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(price)
    }
}

pub struct SnapshotQueries;

impl SnapshotQueries {
    pub async fn insert(conn: &mut SqliteConnection, snapshot: &StabilityPoolSnapshot) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sp_deposit_snapshots (
                branch_id, pool_address, total_deposits, total_collateral, block_number, block_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (branch_id, block_number) DO NOTHING
            "#,
        )
        .bind(snapshot.branch_id as i64)
        .bind(hex_string(snapshot.pool_address.as_bytes()))
        .bind(snapshot.total_deposits.to_string())
        .bind(snapshot.total_collateral.to_string())
        .bind(snapshot.block_number as i64)
        .bind(snapshot.block_timestamp as i64)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_supply(conn: &mut SqliteConnection, block_number: u64, block_timestamp: u64, supply: U256) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_supply_snapshots (block_number, block_timestamp, total_supply)
            VALUES (?, ?, ?)
            ON CONFLICT (block_number) DO NOTHING
            "#,
        )
        .bind(block_number as i64)
        .bind(block_timestamp as i64)
        .bind(supply.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn deposits_in_range(pool: &SqlitePool, branch: Option<u8>, from_ts: u64, to_ts: u64) -> Result<Vec<String>> {
        let branch = branch.map(i64::from);
        let deposits: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT total_deposits FROM sp_deposit_snapshots
            WHERE block_timestamp >= ? AND block_timestamp <= ?
              AND (? IS NULL OR branch_id = ?)
            ORDER BY block_number
            "#,
        )
        .bind(sql_timestamp(from_ts))
        .bind(sql_timestamp(to_ts))
        .bind(branch)
        .bind(branch)
        .fetch_all(pool)
        .await?;

        Ok(deposits)
    }

    pub async fn latest_for_branch(pool: &SqlitePool, branch_id: u8) -> Result<Option<SnapshotRow>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT branch_id, pool_address, total_deposits, total_collateral, block_number, block_timestamp
            FROM sp_deposit_snapshots
            WHERE branch_id = ?
            ORDER BY block_number DESC
            LIMIT 1
            "#,
        )
        .bind(branch_id as i64)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    pub async fn latest_supply(pool: &SqlitePool) -> Result<Option<String>> {
        let supply: Option<String> = sqlx::query_scalar(
            "SELECT total_supply FROM token_supply_snapshots ORDER BY block_number DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;

        Ok(supply)
    }
}

pub struct BranchStatsQueries;

impl BranchStatsQueries {
    /// Upsert by branch id. Omitted fields keep their stored value, or start at zero on insert.
    pub async fn upsert(pool: &SqlitePool, branch_id: u8, branch_name: &str, update: &BranchStatsUpdate) -> Result<()> {
        let fields = [
            update.sp_deposits,
            update.sp_apy,
            update.apy_avg,
            update.sp_apy_avg_1d,
            update.sp_apy_avg_7d,
        ]
        .map(|value| value.map(|v| v.to_string()));

        let mut query = sqlx::query(
            r#"
            INSERT INTO branch_stats (
                branch_id, branch_name, sp_deposits, sp_apy, apy_avg, sp_apy_avg_1d, sp_apy_avg_7d, updated_at
            ) VALUES (
                ?, ?, COALESCE(?, '0'), COALESCE(?, '0'), COALESCE(?, '0'), COALESCE(?, '0'), COALESCE(?, '0'), ?
            )
            ON CONFLICT (branch_id) DO UPDATE SET
                branch_name = excluded.branch_name,
                sp_deposits = COALESCE(?, branch_stats.sp_deposits),
                sp_apy = COALESCE(?, branch_stats.sp_apy),
                apy_avg = COALESCE(?, branch_stats.apy_avg),
                sp_apy_avg_1d = COALESCE(?, branch_stats.sp_apy_avg_1d),
                sp_apy_avg_7d = COALESCE(?, branch_stats.sp_apy_avg_7d),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(branch_id as i64)
        .bind(branch_name);

        for field in &fields {
            query = query.bind(field.clone());
        }
        query = query.bind(Utc::now());
        for field in &fields {
            query = query.bind(field.clone());
        }

        query.execute(pool).await?;
        Ok(())
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<BranchStatsRow>> {
        let rows = sqlx::query_as::<_, BranchStatsRow>(
            r#"
            SELECT branch_id, branch_name, sp_deposits, sp_apy, apy_avg, sp_apy_avg_1d, sp_apy_avg_7d, updated_at
            FROM branch_stats
            ORDER BY branch_id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

pub struct PriceQueries;

impl PriceQueries {
    pub async fn upsert(conn: &mut SqliteConnection, symbol: &str, price: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prices (symbol, price, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (symbol) DO UPDATE SET
                price = excluded.price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol)
        .bind(price)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn get(pool: &SqlitePool, symbol: &str) -> Result<Option<PriceRow>> {
        let row = sqlx::query_as::<_, PriceRow>("SELECT symbol, price, updated_at FROM prices WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<PriceRow>> {
        let rows = sqlx::query_as::<_, PriceRow>("SELECT symbol, price, updated_at FROM prices ORDER BY symbol")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }
}

pub struct GlobalStatsQueries;

impl GlobalStatsQueries {
    pub async fn insert(pool: &SqlitePool, stats: &GlobalStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO global_stats (
                total_bold_supply, total_debt_pending, total_coll_value,
                total_sp_deposits, total_value_locked, max_sp_apy, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(stats.total_bold_supply.to_string())
        .bind(stats.total_debt_pending.to_string())
        .bind(stats.total_coll_value.to_string())
        .bind(stats.total_sp_deposits.to_string())
        .bind(stats.total_value_locked.to_string())
        .bind(stats.max_sp_apy.to_string())
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn latest(pool: &SqlitePool, limit: i64) -> Result<Vec<GlobalStatsRow>> {
        let rows = sqlx::query_as::<_, GlobalStatsRow>(
            r#"
            SELECT total_bold_supply, total_debt_pending, total_coll_value,
                   total_sp_deposits, total_value_locked, max_sp_apy, created_at
            FROM global_stats
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

pub struct DepositQueries;

impl DepositQueries {
    /// Swap the whole materialized view for `rows` in one transaction.
    pub async fn replace_all(pool: &SqlitePool, rows: &[CurrentDepositRow]) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM current_deposits").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO current_deposits (depositor, branch_id, amount, block_number) VALUES (?, ?, ?, ?)",
            )
            .bind(&row.depositor)
            .bind(row.branch_id)
            .bind(&row.amount)
            .bind(row.block_number)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Rows with a non-zero balance, grouped by depositor.
    pub async fn list_nonzero(pool: &SqlitePool) -> Result<Vec<CurrentDepositRow>> {
        let rows = sqlx::query_as::<_, CurrentDepositRow>(
            r#"
            SELECT depositor, branch_id, amount, block_number
            FROM current_deposits
            WHERE amount != '0'
            ORDER BY depositor, branch_id
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}

/// Window bound as stored; bounds past `i64::MAX` saturate instead of wrapping negative.
fn sql_timestamp(ts: u64) -> i64 {
    i64::try_from(ts).unwrap_or(i64::MAX)
}

const HISTORY_UNION: &str = r#"
    SELECT 'SP_DEPOSIT_UPDATED' AS kind, branch_id, pool_address AS contract_address,
           depositor AS account, new_deposit AS amount, block_number, block_timestamp,
           transaction_hash, log_index
    FROM sp_deposit_events
    UNION ALL
    SELECT 'TRANSFER' AS kind, branch_id, pool_address AS contract_address,
           NULL AS account, amount, block_number, block_timestamp,
           transaction_hash, log_index
    FROM interest_rewards
    UNION ALL
    SELECT 'LIQUIDATION' AS kind, branch_id, trove_manager AS contract_address,
           NULL AS account, coll_sent_to_sp AS amount, block_number, block_timestamp,
           transaction_hash, log_index
    FROM liquidations
"#;

const HISTORY_FILTER: &str = r#"
    WHERE (? IS NULL OR branch_id = ?)
      AND (? IS NULL OR kind = ?)
      AND (? IS NULL OR block_timestamp >= ?)
      AND (? IS NULL OR block_timestamp <= ?)
"#;

pub struct HistoryQueries;

impl HistoryQueries {
    /// One newest-first page over all three event tables plus the total match count.
    pub async fn page(pool: &SqlitePool, filter: &HistoryFilter, limit: i64, offset: i64) -> Result<(Vec<EventHistoryEntry>, i64)> {
        let branch = filter.branch.map(i64::from);
        let kind = filter.kind.map(|k| k.as_str());
        let from_ts = filter.from_timestamp.map(sql_timestamp);
        let to_ts = filter.to_timestamp.map(sql_timestamp);

        let count_sql = format!("SELECT COUNT(*) FROM ({}) AS history {}", HISTORY_UNION, HISTORY_FILTER);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(branch)
            .bind(branch)
            .bind(kind)
            .bind(kind)
            .bind(from_ts)
            .bind(from_ts)
            .bind(to_ts)
            .bind(to_ts)
            .fetch_one(pool)
            .await?;

        let page_sql = format!(
            "SELECT * FROM ({}) AS history {} ORDER BY block_number DESC, log_index DESC LIMIT ? OFFSET ?",
            HISTORY_UNION, HISTORY_FILTER
        );
        let entries = sqlx::query_as::<_, EventHistoryEntry>(&page_sql)
            .bind(branch)
            .bind(branch)
            .bind(kind)
            .bind(kind)
            .bind(from_ts)
            .bind(from_ts)
            .bind(to_ts)
            .bind(to_ts)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok((entries, total))
    }
}
