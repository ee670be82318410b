//! Database schema definitions
//!
//! Token amounts are stored as base-10 TEXT so that 256-bit values survive
//! the round trip; block numbers and timestamps fit in INTEGER.

pub const CREATE_EVENT_QUERY_STATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS event_query_state (
    event_type TEXT PRIMARY KEY,
    from_block INTEGER NOT NULL,
    to_block INTEGER NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const CREATE_SP_DEPOSIT_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sp_deposit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    depositor TEXT NOT NULL,
    new_deposit TEXT NOT NULL,
    stashed_collateral TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER,
    transaction_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    branch_id INTEGER NOT NULL,
    pool_address TEXT NOT NULL,
    UNIQUE (transaction_hash, log_index)
)
"#;

pub const CREATE_INTEREST_REWARDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS interest_rewards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    pool_address TEXT NOT NULL,
    amount TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER,
    transaction_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    UNIQUE (transaction_hash, log_index)
)
"#;

pub const CREATE_LIQUIDATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS liquidations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    trove_manager TEXT NOT NULL,
    debt_offset_by_sp TEXT NOT NULL,
    debt_redistributed TEXT NOT NULL,
    bold_gas_compensation TEXT NOT NULL,
    coll_gas_compensation TEXT NOT NULL,
    coll_sent_to_sp TEXT NOT NULL,
    coll_redistributed TEXT NOT NULL,
    coll_surplus TEXT NOT NULL,
    l_eth TEXT NOT NULL,
    l_bold_debt TEXT NOT NULL,
    price TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER,
    transaction_hash TEXT NOT NULL,
    log_index INTEGER NOT NULL,
    UNIQUE (transaction_hash, log_index)
)
"#;

pub const CREATE_SP_DEPOSIT_SNAPSHOTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sp_deposit_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL,
    pool_address TEXT NOT NULL,
    total_deposits TEXT NOT NULL,
    total_collateral TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL,
    UNIQUE (branch_id, block_number)
)
"#;

pub const CREATE_TOKEN_SUPPLY_SNAPSHOTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS token_supply_snapshots (
    block_number INTEGER PRIMARY KEY,
    block_timestamp INTEGER NOT NULL,
    total_supply TEXT NOT NULL
)
"#;

pub const CREATE_BRANCH_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS branch_stats (
    branch_id INTEGER PRIMARY KEY,
    branch_name TEXT NOT NULL,
    sp_deposits TEXT NOT NULL DEFAULT '0',
    sp_apy TEXT NOT NULL DEFAULT '0',
    apy_avg TEXT NOT NULL DEFAULT '0',
    sp_apy_avg_1d TEXT NOT NULL DEFAULT '0',
    sp_apy_avg_7d TEXT NOT NULL DEFAULT '0',
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const CREATE_PRICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS prices (
    symbol TEXT PRIMARY KEY,
    price TEXT NOT NULL,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const CREATE_GLOBAL_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS global_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    total_bold_supply TEXT NOT NULL,
    total_debt_pending TEXT NOT NULL,
    total_coll_value TEXT NOT NULL,
    total_sp_deposits TEXT NOT NULL,
    total_value_locked TEXT NOT NULL,
    max_sp_apy TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const CREATE_CURRENT_DEPOSITS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS current_deposits (
    depositor TEXT NOT NULL,
    branch_id INTEGER NOT NULL,
    amount TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    PRIMARY KEY (depositor, branch_id)
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_sp_deposit_events_block ON sp_deposit_events(block_number, log_index)",
    "CREATE INDEX IF NOT EXISTS idx_sp_deposit_events_ts ON sp_deposit_events(block_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_interest_rewards_branch_ts ON interest_rewards(branch_id, block_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_liquidations_branch_ts ON liquidations(branch_id, block_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_sp_deposit_snapshots_branch_ts ON sp_deposit_snapshots(branch_id, block_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_global_stats_created ON global_stats(created_at)",
];

pub const CREATE_TABLES: &[&str] = &[
    CREATE_EVENT_QUERY_STATE_TABLE,
    CREATE_SP_DEPOSIT_EVENTS_TABLE,
    CREATE_INTEREST_REWARDS_TABLE,
    CREATE_LIQUIDATIONS_TABLE,
    CREATE_SP_DEPOSIT_SNAPSHOTS_TABLE,
    CREATE_TOKEN_SUPPLY_SNAPSHOTS_TABLE,
    CREATE_BRANCH_STATS_TABLE,
    CREATE_PRICES_TABLE,
    CREATE_GLOBAL_STATS_TABLE,
    CREATE_CURRENT_DEPOSITS_TABLE,
];
