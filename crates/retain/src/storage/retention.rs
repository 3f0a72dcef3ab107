//! Retention policies: consolidation and decay
//!
//! Consolidation moves short-term memories that proved important (or were
//! queried often) into long-term storage. Decay forgets long-term memories
//! that are both unimportant and untouched for long enough. Neither pass is
//! self-scheduling; the caller decides when to run them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::check_unit_interval;
use crate::error::{Result, RetainError};
use crate::memory::types::{MemoryId, Tier};
use crate::storage::tiers::TierStore;

/// Forget a memory only when `forgetting_rate * age_days` exceeds this
const FORGET_PROBABILITY_CUTOFF: f64 = 0.9;

/// Configuration for consolidation and decay, fixed at store construction
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Importance at which a short-term memory is promoted (default: 0.7)
    #[serde(default = "default_consolidation_threshold")]
    pub consolidation_threshold: f32,
    /// Forgetting rate per day of inactivity (default: 0.1)
    #[serde(default = "default_forgetting_rate")]
    pub forgetting_rate: f64,
    /// Memories at or above this importance are never forgotten (default: 0.5)
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: f32,
    /// Promote when the access count exceeds this (default: 5)
    #[serde(default = "default_promotion_access_count")]
    pub promotion_access_count: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            consolidation_threshold: default_consolidation_threshold(),
            forgetting_rate: default_forgetting_rate(),
            importance_threshold: default_importance_threshold(),
            promotion_access_count: default_promotion_access_count(),
        }
    }
}

fn default_consolidation_threshold() -> f32 {
    0.7
}

fn default_forgetting_rate() -> f64 {
    0.1
}

fn default_importance_threshold() -> f32 {
    0.5
}

fn default_promotion_access_count() -> u32 {
    5
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval(
            "retention.consolidation_threshold",
            self.consolidation_threshold,
        )?;
        check_unit_interval("retention.importance_threshold", self.importance_threshold)?;
        if !self.forgetting_rate.is_finite() || self.forgetting_rate < 0.0 {
            return Err(RetainError::Config(format!(
                "retention.forgetting_rate must be a non-negative number, got {}",
                self.forgetting_rate
            )));
        }
        Ok(())
    }

    /// Deterministic "probability" that a memory idle for `age_days` is forgotten
    pub fn forget_probability(&self, age_days: i64) -> f64 {
        self.forgetting_rate * age_days.max(0) as f64
    }
}

/// Outcome of a maintenance run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    /// Memories moved from short-term to long-term
    pub promoted: Vec<MemoryId>,
    /// Long-term memories forgotten by decay
    pub forgotten: Vec<MemoryId>,
}

impl MaintenanceReport {
    /// True if the run changed nothing
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.forgotten.is_empty()
    }
}

impl TierStore {
    /// Promote qualifying short-term memories to long-term.
    ///
    /// Promotion keeps the id and every field except `tier`. No associations
    /// are created.
    pub fn consolidate(&mut self, config: &RetentionConfig) -> Vec<MemoryId> {
        let (promote, keep): (Vec<_>, Vec<_>) = self.short_term.drain(..).partition(|item| {
            item.importance >= config.consolidation_threshold
                || item.access_count > config.promotion_access_count
        });
        self.short_term = keep.into();

        let mut promoted = Vec::with_capacity(promote.len());
        for mut item in promote {
            item.tier = Tier::LongTerm;
            debug!(id = %item.id, importance = item.importance, "consolidated memory to long-term");
            promoted.push(item.id);
            self.long_term.insert(item.id, item);
        }
        promoted
    }

    /// Forget stale, unimportant long-term memories as of now
    pub fn decay(&mut self, config: &RetentionConfig) -> Vec<MemoryId> {
        self.decay_at(config, Utc::now())
    }

    /// Forget stale, unimportant long-term memories as of `now`.
    ///
    /// A memory goes when `forgetting_rate * whole_days_idle > 0.9` and its
    /// importance is below `importance_threshold`. Removal goes through
    /// `remove`, so peers lose their links to it.
    pub fn decay_at(&mut self, config: &RetentionConfig, now: DateTime<Utc>) -> Vec<MemoryId> {
        let doomed: Vec<MemoryId> = self
            .long_term_ordered()
            .into_iter()
            .filter(|item| {
                let age_days = (now - item.last_access).num_days();
                config.forget_probability(age_days) > FORGET_PROBABILITY_CUTOFF
                    && item.importance < config.importance_threshold
            })
            .map(|item| item.id)
            .collect();

        for id in &doomed {
            if self.remove(*id).is_ok() {
                debug!(%id, "forgot long-term memory");
            }
        }
        doomed
    }

    /// One consolidation pass followed by one decay pass
    pub fn run_maintenance(&mut self, config: &RetentionConfig) -> MaintenanceReport {
        self.run_maintenance_at(config, Utc::now())
    }

    pub fn run_maintenance_at(
        &mut self,
        config: &RetentionConfig,
        now: DateTime<Utc>,
    ) -> MaintenanceReport {
        let promoted = self.consolidate(config);
        let forgotten = self.decay_at(config, now);
        let report = MaintenanceReport {
            promoted,
            forgotten,
        };
        if !report.is_empty() {
            info!(
                promoted = report.promoted.len(),
                forgotten = report.forgotten.len(),
                "maintenance complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tiers::TierConfig;
    use crate::testing::{idle_for, item};
    use chrono::Duration;

    fn store() -> TierStore {
        TierStore::new(TierConfig::default())
    }

    mod config {
        use super::*;

        #[test]
        fn test_default_config() {
            let config = RetentionConfig::default();
            assert_eq!(config.consolidation_threshold, 0.7);
            assert_eq!(config.forgetting_rate, 0.1);
            assert_eq!(config.importance_threshold, 0.5);
            assert_eq!(config.promotion_access_count, 5);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_forget_probability() {
            let config = RetentionConfig::default();
            assert!((config.forget_probability(10) - 1.0).abs() < 1e-9);
            assert!((config.forget_probability(5) - 0.5).abs() < 1e-9);
            assert_eq!(config.forget_probability(-3), 0.0);
        }

        #[test]
        fn test_nine_days_is_not_over_cutoff() {
            // 0.1 * 9 lands exactly on 0.9 in f64, which is not > 0.9
            let config = RetentionConfig::default();
            assert!(config.forget_probability(9) <= FORGET_PROBABILITY_CUTOFF);
        }
    }

    mod consolidation {
        use super::*;

        #[test]
        fn test_important_memory_is_promoted() {
            let mut store = store();
            let id = store.store(item(0.7, Tier::ShortTerm)).unwrap();

            let promoted = store.consolidate(&RetentionConfig::default());

            assert_eq!(promoted, vec![id]);
            assert_eq!(store.tier_of(id), Some(Tier::LongTerm));
            assert_eq!(store.len(Tier::ShortTerm), 0);
        }

        #[test]
        fn test_frequently_accessed_memory_is_promoted() {
            let mut store = store();
            let mut busy = item(0.1, Tier::ShortTerm);
            busy.access_count = 6;
            let mut borderline = item(0.1, Tier::ShortTerm);
            borderline.access_count = 5;
            let busy = store.store(busy).unwrap();
            let borderline = store.store(borderline).unwrap();

            store.consolidate(&RetentionConfig::default());

            assert_eq!(store.tier_of(busy), Some(Tier::LongTerm));
            assert_eq!(store.tier_of(borderline), Some(Tier::ShortTerm));
        }

        #[test]
        fn test_promotion_preserves_fields_and_order() {
            let mut store = store();
            let keep_a = store.store(item(0.2, Tier::ShortTerm)).unwrap();
            let original = item(0.9, Tier::ShortTerm);
            let promote = store.store(original.clone()).unwrap();
            let keep_b = store.store(item(0.3, Tier::ShortTerm)).unwrap();

            store.consolidate(&RetentionConfig::default());

            let moved = store.get(promote).unwrap();
            assert_eq!(moved.content, original.content);
            assert_eq!(moved.created_at, original.created_at);
            assert_eq!(moved.importance, original.importance);
            assert!(moved.associations.is_empty());

            let remaining: Vec<_> = store.iter_tier(Tier::ShortTerm).map(|m| m.id).collect();
            assert_eq!(remaining, vec![keep_a, keep_b]);
        }

        #[test]
        fn test_working_memory_is_never_promoted() {
            let mut store = store();
            let id = store.store(item(1.0, Tier::Working)).unwrap();
            assert!(store.consolidate(&RetentionConfig::default()).is_empty());
            assert_eq!(store.tier_of(id), Some(Tier::Working));
        }
    }

    mod decay {
        use super::*;

        #[test]
        fn test_stale_unimportant_memory_is_forgotten() {
            let mut store = store();
            let id = store.store(idle_for(item(0.3, Tier::LongTerm), 10)).unwrap();

            let forgotten = store.decay(&RetentionConfig::default());

            assert_eq!(forgotten, vec![id]);
            assert!(!store.contains(id));
        }

        #[test]
        fn test_recently_used_memory_survives() {
            let mut store = store();
            let id = store.store(idle_for(item(0.3, Tier::LongTerm), 5)).unwrap();

            assert!(store.decay(&RetentionConfig::default()).is_empty());
            assert!(store.contains(id));
        }

        #[test]
        fn test_important_memory_survives_any_age() {
            let mut store = store();
            let id = store.store(idle_for(item(0.5, Tier::LongTerm), 365)).unwrap();

            assert!(store.decay(&RetentionConfig::default()).is_empty());
            assert!(store.contains(id));
        }

        #[test]
        fn test_partial_days_are_truncated() {
            let mut store = store();
            let mut memory = item(0.1, Tier::LongTerm);
            let now = Utc::now();
            memory.last_access = now - Duration::days(9) - Duration::hours(23);
            let id = store.store(memory).unwrap();

            assert!(store.decay_at(&RetentionConfig::default(), now).is_empty());
            assert!(store.contains(id));

            let forgotten = store.decay_at(&RetentionConfig::default(), now + Duration::hours(1));
            assert_eq!(forgotten, vec![id]);
        }

        #[test]
        fn test_decay_ignores_bounded_tiers() {
            let mut store = store();
            let w = store.store(idle_for(item(0.0, Tier::Working), 100)).unwrap();
            let s = store.store(idle_for(item(0.0, Tier::ShortTerm), 100)).unwrap();

            assert!(store.decay(&RetentionConfig::default()).is_empty());
            assert!(store.contains(w));
            assert!(store.contains(s));
        }

        #[test]
        fn test_decay_keeps_associations_symmetric() {
            let mut store = store();
            let doomed = store.store(idle_for(item(0.2, Tier::LongTerm), 30)).unwrap();
            let keeper = store.store(item(0.9, Tier::LongTerm)).unwrap();
            store.associate(doomed, keeper).unwrap();

            store.decay(&RetentionConfig::default());

            assert!(store.get(keeper).unwrap().associations.is_empty());
            assert!(store.check_invariants().is_ok());
        }
    }

    mod maintenance {
        use super::*;

        #[test]
        fn test_run_maintenance_reports_both_passes() {
            let mut store = store();
            let promoted = store.store(item(0.8, Tier::ShortTerm)).unwrap();
            let forgotten = store.store(idle_for(item(0.1, Tier::LongTerm), 20)).unwrap();

            let report = store.run_maintenance(&RetentionConfig::default());

            assert_eq!(report.promoted, vec![promoted]);
            assert_eq!(report.forgotten, vec![forgotten]);
        }

        #[test]
        fn test_promoted_stale_memory_can_decay_in_same_run() {
            let mut store = store();
            let mut memory = idle_for(item(0.2, Tier::ShortTerm), 15);
            memory.access_count = 9;
            let id = store.store(memory).unwrap();

            let report = store.run_maintenance(&RetentionConfig::default());

            assert_eq!(report.promoted, vec![id]);
            assert_eq!(report.forgotten, vec![id]);
            assert!(!store.contains(id));
        }

        #[test]
        fn test_maintenance_is_idempotent() {
            let mut store = store();
            store.store(item(0.9, Tier::ShortTerm)).unwrap();
            store.store(item(0.2, Tier::ShortTerm)).unwrap();
            store.store(idle_for(item(0.1, Tier::LongTerm), 40)).unwrap();
            store.store(idle_for(item(0.1, Tier::LongTerm), 2)).unwrap();
            let config = RetentionConfig::default();
            let now = Utc::now();

            let first = store.run_maintenance_at(&config, now);
            let after_first = store.stats();
            let ids_after_first: Vec<_> = store.iter().map(|m| m.id).collect();

            let second = store.run_maintenance_at(&config, now);

            assert!(!first.is_empty());
            assert!(second.is_empty());
            assert_eq!(store.stats(), after_first);
            assert_eq!(store.iter().map(|m| m.id).collect::<Vec<_>>(), ids_after_first);
        }
    }
}
