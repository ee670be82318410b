//! Error types for the indexer

use thiserror::Error;
use rpc_core::RpcError;
use sp_math::MathError;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Arithmetic error: {0}")]
    Math(#[from] MathError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;

impl From<toml::de::Error> for IndexerError {
    fn from(err: toml::de::Error) -> Self {
        IndexerError::Config(err.to_string())
    }
}

impl From<url::ParseError> for IndexerError {
    fn from(err: url::ParseError) -> Self {
        IndexerError::Config(format!("invalid URL: {}", err))
    }
}
