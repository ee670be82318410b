//! Yield aggregation and derived stats

pub mod aggregator;
pub mod refresh;

pub use aggregator::{ApyCalculation, BranchSelector, YieldAggregator};
pub use refresh::StatsRefresher;
