//! Configuration: TOML file, then environment, then CLI flags.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use rpc_core::Address;
use url::Url;
use crate::error::{IndexerError, Result};

/// Provider cap on block-range width per `eth_getLogs` call.
pub const DEFAULT_LOG_CHUNK_SIZE: u64 = 9000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub branches: Vec<BranchConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// First block scanned for an event kind that has no checkpoint yet
    #[serde(default)]
    pub origin_block: u64,
    #[serde(default = "default_log_chunk_size")]
    pub log_chunk_size: u64,
    #[serde(default)]
    pub multicall_address: Option<Address>,
    pub bold_token: Address,
    #[serde(default = "default_timestamp_concurrency")]
    pub timestamp_concurrency: usize,
}

fn default_log_chunk_size() -> u64 {
    DEFAULT_LOG_CHUNK_SIZE
}

fn default_timestamp_concurrency() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    pub id: u8,
    pub symbol: String,
    pub stability_pool: Address,
    pub trove_manager: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("pool_stats.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a key lookup; `apply_env_overrides` passes the process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CHAIN_RPC_URL") {
            self.chain.rpc_url = url;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.path = database_path_from_url(&url);
        }
        if let Some(block) = lookup("ORIGIN_BLOCK").and_then(|v| v.trim().parse().ok()) {
            self.chain.origin_block = block;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn apply_cli_overrides(&mut self, args: &crate::cli::Args) {
        if let Some(database) = &args.database {
            self.database.path = database.clone();
        }
        if let Some(rpc_url) = &args.rpc_url {
            self.chain.rpc_url = rpc_url.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.chain.rpc_url)?;

        if self.branches.is_empty() {
            return Err(IndexerError::Config("at least one branch must be configured".into()));
        }
        let mut seen = HashSet::new();
        for branch in &self.branches {
            if !seen.insert(branch.id) {
                return Err(IndexerError::Config(format!("duplicate branch id {}", branch.id)));
            }
        }
        if self.chain.log_chunk_size == 0 {
            return Err(IndexerError::Config("log_chunk_size must be at least 1".into()));
        }
        if self.chain.timestamp_concurrency == 0 {
            return Err(IndexerError::Config("timestamp_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Accept both bare paths and `sqlite:` URLs.
pub fn database_path_from_url(url: &str) -> PathBuf {
    let trimmed = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
    PathBuf::from(trimmed)
}
