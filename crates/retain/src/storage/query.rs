//! Declarative memory queries
//!
//! A query is a set of optional predicates combined with AND logic. Matching
//! is not read-only: every hit has its access statistics bumped, which feeds
//! back into consolidation and decay.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::memory::types::{MemoryItem, Tier};
use crate::storage::tiers::TierStore;

/// Filter criteria for memory search.
///
/// All fields are optional - when `None`, that predicate is not applied.
/// Unknown keys in the JSON form are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Matches memories sharing at least one tag (an empty set matches nothing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// Minimum importance (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f32>,
    /// Creation time window, inclusive on both ends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl MemoryQuery {
    /// Create a new empty query (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the declarative JSON form, e.g.
    /// `{"tags": ["meeting"], "importance": 0.4}`
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Require at least one of `tags`
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Require `importance >= min`
    pub fn with_min_importance(mut self, min: f32) -> Self {
        self.importance = Some(min);
        self
    }

    /// Require `start <= created_at <= end`
    pub fn created_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range = Some((start, end));
        self
    }

    /// Returns true if every present predicate holds for `item`
    pub fn matches(&self, item: &MemoryItem) -> bool {
        if let Some(ref tags) = self.tags {
            if !item.has_any_tag(tags) {
                return false;
            }
        }
        if let Some(min) = self.importance {
            if item.importance < min {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if item.created_at < start || item.created_at > end {
                return false;
            }
        }
        true
    }
}

impl TierStore {
    /// Find memories matching `query`, restricted to `tier` when given.
    ///
    /// Results come back working, short-term, long-term. Each match has its
    /// access count incremented and `last_access` refreshed before it is
    /// returned.
    pub fn search(&mut self, query: &MemoryQuery, tier: Option<Tier>) -> Vec<MemoryItem> {
        let tiers: Vec<Tier> = match tier {
            Some(tier) => vec![tier],
            None => Tier::ALL.to_vec(),
        };

        let mut results = Vec::new();
        for tier in tiers {
            match tier {
                Tier::Working => collect_matches(self.working.iter_mut(), query, &mut results),
                Tier::ShortTerm => collect_matches(self.short_term.iter_mut(), query, &mut results),
                Tier::LongTerm => {
                    for id in self.long_term_ids() {
                        if let Some(item) = self.long_term.get_mut(&id) {
                            touch_if_match(item, query, &mut results);
                        }
                    }
                }
            }
        }

        tracing::debug!(matches = results.len(), ?tier, "search complete");
        results
    }
}

fn collect_matches<'a>(
    items: impl Iterator<Item = &'a mut MemoryItem>,
    query: &MemoryQuery,
    results: &mut Vec<MemoryItem>,
) {
    for item in items {
        touch_if_match(item, query, results);
    }
}

fn touch_if_match(item: &mut MemoryItem, query: &MemoryQuery, results: &mut Vec<MemoryItem>) {
    if query.matches(item) {
        item.mark_accessed();
        results.push(item.clone());
    }
}
