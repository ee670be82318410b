//! Event ingestion: checkpoints, chunked scanning, snapshots and persistence

pub mod backfill;
pub mod checkpoint;
pub mod decode;
pub mod ledger;
pub mod scanner;
pub mod service;
pub mod snapshot;
pub mod writer;

pub use backfill::TimestampBackfill;
pub use checkpoint::CheckpointStore;
pub use service::{IndexerService, IndexerSettings};
pub use snapshot::SnapshotSampler;
pub use writer::EventStore;
