//! Tier storage for Retain
//!
//! Owns every memory. Working and short-term memories sit in bounded FIFO
//! queues; long-term memories sit in an id-keyed arena that the association
//! index and the decay pass operate on.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RetainError};
use crate::memory::types::{MemoryId, MemoryItem, Tier};

/// Capacity configuration for the bounded tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct TierConfig {
    /// Maximum number of working memories (default: 10)
    #[serde(default = "default_working_capacity")]
    pub working_capacity: usize,
    /// Maximum number of short-term memories (default: 100)
    #[serde(default = "default_short_term_capacity")]
    pub short_term_capacity: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            working_capacity: default_working_capacity(),
            short_term_capacity: default_short_term_capacity(),
        }
    }
}

fn default_working_capacity() -> usize {
    10
}

fn default_short_term_capacity() -> usize {
    100
}

impl TierConfig {
    /// Create a new tier configuration with custom capacities
    pub fn new(working_capacity: usize, short_term_capacity: usize) -> Self {
        Self {
            working_capacity,
            short_term_capacity,
        }
    }

    /// Capacity of `tier`, `None` for the unbounded long-term tier
    pub fn capacity(&self, tier: Tier) -> Option<usize> {
        match tier {
            Tier::Working => Some(self.working_capacity),
            Tier::ShortTerm => Some(self.short_term_capacity),
            Tier::LongTerm => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.working_capacity == 0 || self.short_term_capacity == 0 {
            return Err(RetainError::Config(
                "tier capacities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-tier item counts, as reported to monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub working_count: usize,
    pub short_term_count: usize,
    pub long_term_count: usize,
    pub total: usize,
}

/// The three retention tiers.
///
/// `TierStore` is a plain single-threaded structure; `MemoryStore` wraps it
/// in a lock and adds persistence.
#[derive(Debug, Clone, Default)]
pub struct TierStore {
    pub(crate) config: TierConfig,
    pub(crate) working: VecDeque<MemoryItem>,
    pub(crate) short_term: VecDeque<MemoryItem>,
    pub(crate) long_term: HashMap<MemoryId, MemoryItem>,
}

impl TierStore {
    /// Create an empty store with the given capacities
    pub fn new(config: TierConfig) -> Self {
        Self {
            config,
            working: VecDeque::with_capacity(config.working_capacity),
            short_term: VecDeque::with_capacity(config.short_term_capacity),
            long_term: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Insert `item` into the tier named on it.
    ///
    /// A full working or short-term tier drops its oldest entry first.
    /// Long-term never evicts on insert.
    pub fn store(&mut self, item: MemoryItem) -> Result<MemoryId> {
        item.validate()?;
        if !item.associations.is_empty() {
            return Err(RetainError::InvalidItem(
                "new memories cannot carry associations".to_string(),
            ));
        }
        if self.contains(item.id) {
            return Err(RetainError::InvalidItem(format!(
                "memory {} already exists",
                item.id
            )));
        }

        let id = item.id;
        let tier = item.tier;
        match tier {
            Tier::Working => {
                push_bounded(&mut self.working, item, self.config.working_capacity, tier)
            }
            Tier::ShortTerm => push_bounded(
                &mut self.short_term,
                item,
                self.config.short_term_capacity,
                tier,
            ),
            Tier::LongTerm => {
                self.long_term.insert(id, item);
            }
        }

        debug!(%id, %tier, "stored memory");
        Ok(id)
    }

    /// Look up a memory in any tier
    pub fn get(&self, id: MemoryId) -> Option<&MemoryItem> {
        self.long_term
            .get(&id)
            .or_else(|| self.working.iter().find(|m| m.id == id))
            .or_else(|| self.short_term.iter().find(|m| m.id == id))
    }

    /// Returns true if `id` lives in any tier
    pub fn contains(&self, id: MemoryId) -> bool {
        self.get(id).is_some()
    }

    /// Which tier currently holds `id`
    pub fn tier_of(&self, id: MemoryId) -> Option<Tier> {
        self.get(id).map(|m| m.tier)
    }

    /// Delete a memory from whichever tier holds it.
    ///
    /// Removing a long-term memory also scrubs its id from every peer it
    /// was associated with.
    pub fn remove(&mut self, id: MemoryId) -> Result<MemoryItem> {
        if let Some(item) = self.long_term.remove(&id) {
            for peer in &item.associations {
                if let Some(peer_item) = self.long_term.get_mut(peer) {
                    peer_item.associations.remove(&id);
                }
            }
            debug!(%id, peers = item.associations.len(), "removed long-term memory");
            return Ok(item);
        }

        take_from(&mut self.working, id)
            .or_else(|| take_from(&mut self.short_term, id))
            .inspect(|item| debug!(%id, tier = %item.tier, "removed memory"))
            .ok_or_else(|| RetainError::memory_not_found(id))
    }

    /// Iterate every memory: working, then short-term, then long-term.
    ///
    /// Each call starts a fresh pass over the current contents.
    pub fn iter(&self) -> impl Iterator<Item = &MemoryItem> + '_ {
        Tier::ALL.into_iter().flat_map(move |tier| self.iter_tier(tier))
    }

    /// Iterate one tier. Bounded tiers yield oldest first, long-term yields
    /// by creation time.
    pub fn iter_tier(&self, tier: Tier) -> Box<dyn Iterator<Item = &MemoryItem> + '_> {
        match tier {
            Tier::Working => Box::new(self.working.iter()),
            Tier::ShortTerm => Box::new(self.short_term.iter()),
            Tier::LongTerm => Box::new(self.long_term_ordered().into_iter()),
        }
    }

    /// Long-term memories ordered by `created_at`, then id
    pub(crate) fn long_term_ordered(&self) -> Vec<&MemoryItem> {
        let mut items: Vec<&MemoryItem> = self.long_term.values().collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Long-term ids in the same order as `long_term_ordered`
    pub(crate) fn long_term_ids(&self) -> Vec<MemoryId> {
        self.long_term_ordered().into_iter().map(|m| m.id).collect()
    }

    /// Number of memories in `tier`
    pub fn len(&self, tier: Tier) -> usize {
        match tier {
            Tier::Working => self.working.len(),
            Tier::ShortTerm => self.short_term.len(),
            Tier::LongTerm => self.long_term.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.working.len() + self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            working_count: self.working.len(),
            short_term_count: self.short_term.len(),
            long_term_count: self.long_term.len(),
            total: self.total(),
        }
    }

    /// Check the structural invariants: capacity bounds, importance bounds,
    /// tier fields matching their collection, and symmetric associations
    /// between long-term memories only.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for tier in [Tier::Working, Tier::ShortTerm] {
            let cap = self.config.capacity(tier).unwrap_or(usize::MAX);
            if self.len(tier) > cap {
                return Err(format!("{tier} holds {} items, capacity {cap}", self.len(tier)));
            }
        }

        for tier in Tier::ALL {
            for item in self.iter_tier(tier) {
                if item.tier != tier {
                    return Err(format!("{} is in {tier} but tagged {}", item.id, item.tier));
                }
                if !(0.0..=1.0).contains(&item.importance) {
                    return Err(format!("{} has importance {}", item.id, item.importance));
                }
                if tier != Tier::LongTerm && !item.associations.is_empty() {
                    return Err(format!("{} holds associations outside long-term", item.id));
                }
            }
        }

        for item in self.long_term.values() {
            for peer in &item.associations {
                match self.long_term.get(peer) {
                    Some(p) if p.associations.contains(&item.id) => {}
                    Some(_) => return Err(format!("{} -> {peer} is not symmetric", item.id)),
                    None => return Err(format!("{} -> {peer} dangles", item.id)),
                }
            }
        }

        Ok(())
    }
}

fn push_bounded(
    queue: &mut VecDeque<MemoryItem>,
    item: MemoryItem,
    capacity: usize,
    tier: Tier,
) {
    while queue.len() >= capacity {
        match queue.pop_front() {
            Some(evicted) => debug!(id = %evicted.id, %tier, "evicted oldest memory"),
            None => break,
        }
    }
    queue.push_back(item);
}

fn take_from(queue: &mut VecDeque<MemoryItem>, id: MemoryId) -> Option<MemoryItem> {
    queue
        .iter()
        .position(|m| m.id == id)
        .and_then(|pos| queue.remove(pos))
}
