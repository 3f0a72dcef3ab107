//! Retain - tiered memory store for autonomous agents
//!
//! Memories live in one of three tiers (working, short-term, long-term).
//! Short-term memories are consolidated into long-term storage, long-term
//! memories can be associated with each other and are forgotten when they
//! go stale, and the whole store is snapshotted to disk.

pub mod config;
pub mod error;
pub mod memory;
pub mod storage;
pub mod testing;

pub use error::{RetainError, Result};
pub use memory::{
    FixedScorer, ImportanceScorer, MemoryId, MemoryItem, MemoryProcessor, ScorerError, Tier,
};
pub use storage::{
    MaintenanceReport, MemoryQuery, MemoryStats, MemoryStore, RetentionConfig, Snapshot, TierConfig,
    TierStore,
};
