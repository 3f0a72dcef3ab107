//! Memory types for the Retain store
//!
//! Defines the remembered unit (`MemoryItem`) and the tier it lives in.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, RetainError};

/// Stable identifier of a memory, minted once at creation
pub type MemoryId = Uuid;

/// A single remembered unit stored in one of the tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier for this memory
    pub id: MemoryId,
    /// Caller-defined payload
    pub content: Value,
    /// When this memory was created
    pub created_at: DateTime<Utc>,
    /// When this memory was last returned by a query
    pub last_access: DateTime<Utc>,
    /// Importance score in `[0.0, 1.0]`
    pub importance: f32,
    /// Which tier this memory currently lives in
    pub tier: Tier,
    /// Free-form labels used by tag queries
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// How many times this memory matched a query
    #[serde(default)]
    pub access_count: u32,
    /// Linked long-term memories (always symmetric)
    #[serde(default)]
    pub associations: BTreeSet<MemoryId>,
}

impl MemoryItem {
    /// Create a new memory with a fresh id.
    ///
    /// Fails with `InvalidItem` when `importance` is not a finite value in `[0, 1]`.
    pub fn new(content: Value, importance: f32, tier: Tier) -> Result<Self> {
        validate_importance(importance)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            created_at: now,
            last_access: now,
            importance,
            tier,
            tags: BTreeSet::new(),
            access_count: 0,
            associations: BTreeSet::new(),
        })
    }

    /// Attach tags, replacing any existing ones
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Mark this memory as accessed, updating access count and timestamp
    pub fn mark_accessed(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_access = Utc::now();
    }

    /// Returns true if the memory carries at least one of `tags`
    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }

    /// Check the invariants an item must satisfy before it enters a tier
    pub(crate) fn validate(&self) -> Result<()> {
        validate_importance(self.importance)
    }
}

fn validate_importance(importance: f32) -> Result<()> {
    if !importance.is_finite() || !(0.0..=1.0).contains(&importance) {
        return Err(RetainError::InvalidItem(format!(
            "importance must be within [0.0, 1.0], got {importance}"
        )));
    }
    Ok(())
}

/// Retention class of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Small volatile scratch space, FIFO
    Working,
    /// Staging area for consolidation, FIFO
    ShortTerm,
    /// Unbounded, id-keyed, subject to decay and associations
    LongTerm,
}

impl Tier {
    /// All tiers in scan order
    pub const ALL: [Tier; 3] = [Tier::Working, Tier::ShortTerm, Tier::LongTerm];

    /// Convert tier to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Working => "working",
            Tier::ShortTerm => "short_term",
            Tier::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = RetainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "working" => Ok(Tier::Working),
            "short_term" | "shortterm" | "short" => Ok(Tier::ShortTerm),
            "long_term" | "longterm" | "long" => Ok(Tier::LongTerm),
            other => Err(RetainError::InvalidItem(format!(
                "unknown tier: {other}. Use working, short_term, or long_term."
            ))),
        }
    }
}
