//! Storage for event history, snapshots and derived stats

pub mod schema;
pub mod queries;
pub mod connection;

pub use connection::Database;
pub use schema::*;
