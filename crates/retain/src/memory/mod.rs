//! Memory types and operations
//!
//! Defines the memory record, the importance scoring seam, and the
//! processor that classifies incoming information into a tier.

pub mod processor;
pub mod scorer;
pub mod types;

pub use processor::MemoryProcessor;
pub use scorer::{FixedScorer, ImportanceScorer, ScorerError};
pub use types::{MemoryId, MemoryItem, Tier};
