//! Stability pool indexer
//!
//! Ingests deposit, interest and liquidation events into SQLite, samples
//! pool balances, and aggregates the stored history into APY statistics.

pub mod api;
pub mod apy;
pub mod cli;
pub mod config;
pub mod contracts;
pub mod database;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod rpc_client;

pub use error::{IndexerError, Result};

// Type alias for database pool
pub type DbPool = sqlx::SqlitePool;
