//! Storage layer: tiers, associations, retention, queries and snapshots

pub mod association;
pub mod persister;
pub mod query;
pub mod retention;
pub mod snapshot;
pub mod store;
pub mod tiers;

pub use persister::SnapshotWriter;
pub use query::MemoryQuery;
pub use retention::{MaintenanceReport, RetentionConfig};
pub use snapshot::{SNAPSHOT_VERSION, Snapshot};
pub use store::MemoryStore;
pub use tiers::{MemoryStats, TierConfig, TierStore};
