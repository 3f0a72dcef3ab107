//! Memory Processor
//!
//! Entry point for new information: scores it, derives tags, picks a tier
//! and stores it. Everything else is forwarded to the shared store.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::ProcessorConfig;
use crate::error::{Result, RetainError};
use crate::memory::scorer::ImportanceScorer;
use crate::memory::types::{MemoryId, MemoryItem, Tier};
use crate::storage::{MaintenanceReport, MemoryQuery, MemoryStats, MemoryStore};

/// Classifies incoming information and routes it into the store.
///
/// The processor:
/// 1. Asks the scorer for an importance (feedback passed through untouched)
/// 2. Rejects scores outside `[0, 1]`
/// 3. Derives tags from the payload's `category` and `context` fields
/// 4. Picks a tier from the configured thresholds
/// 5. Stores the memory
#[derive(Clone)]
pub struct MemoryProcessor {
    store: MemoryStore,
    scorer: Arc<dyn ImportanceScorer>,
    config: ProcessorConfig,
}

impl std::fmt::Debug for MemoryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProcessor")
            .field("store", &self.store)
            .field("scorer", &self.scorer.name())
            .field("config", &self.config)
            .finish()
    }
}

impl MemoryProcessor {
    pub fn new(
        store: MemoryStore,
        scorer: Arc<dyn ImportanceScorer>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            scorer,
            config,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Score, classify and store `information`.
    ///
    /// Nothing is stored when the scorer fails or returns an out-of-range
    /// importance.
    pub async fn process(
        &self,
        information: Value,
        tags_hint: &[String],
        feedback: Option<f32>,
    ) -> Result<MemoryId> {
        let importance = self.scorer.score(&information, feedback).await?;
        if !importance.is_finite() || !(0.0..=1.0).contains(&importance) {
            return Err(RetainError::InvalidItem(format!(
                "scorer '{}' returned importance {importance} outside [0.0, 1.0]",
                self.scorer.name()
            )));
        }

        let tier = self.select_tier(importance);
        let tags = derive_tags(&information, tags_hint);
        let memory = MemoryItem::new(information, importance, tier)?.with_tags(tags);

        let id = self.store.store(memory).await?;
        debug!(%id, %tier, importance, scorer = self.scorer.name(), "processed information");
        Ok(id)
    }

    /// Tier for a given importance
    pub fn select_tier(&self, importance: f32) -> Tier {
        if importance >= self.config.long_term_threshold {
            Tier::LongTerm
        } else if importance >= self.config.short_term_threshold {
            Tier::ShortTerm
        } else {
            Tier::Working
        }
    }

    pub async fn search(&self, query: &MemoryQuery, tier: Option<Tier>) -> Vec<MemoryItem> {
        self.store.search(query, tier).await
    }

    pub async fn related(&self, id: MemoryId) -> Result<Vec<MemoryItem>> {
        self.store.related(id).await
    }

    pub async fn associate(&self, a: MemoryId, b: MemoryId) -> Result<bool> {
        self.store.associate(a, b).await
    }

    pub async fn remove(&self, id: MemoryId) -> Result<MemoryItem> {
        self.store.remove(id).await
    }

    /// Consolidation then decay
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        self.store.run_maintenance().await
    }

    pub async fn stats(&self) -> MemoryStats {
        self.store.stats().await
    }

    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.store.shutdown().await
    }
}

/// Tags from the payload's string `category` and whitespace-split `context`,
/// merged with `hint`. Blank tags are dropped.
pub fn derive_tags(information: &Value, hint: &[String]) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    if let Some(category) = information.get("category").and_then(Value::as_str) {
        tags.insert(category.trim().to_string());
    }
    if let Some(context) = information.get("context").and_then(Value::as_str) {
        tags.extend(context.split_whitespace().map(str::to_string));
    }
    tags.extend(hint.iter().map(|t| t.trim().to_string()));

    tags.retain(|t| !t.is_empty());
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::scorer::FixedScorer;
    use crate::storage::{RetentionConfig, TierConfig};
    use crate::testing::ScriptedScorer;
    use serde_json::json;

    fn processor_with(scorer: impl ImportanceScorer + 'static) -> MemoryProcessor {
        let store = MemoryStore::in_memory(TierConfig::default(), RetentionConfig::default());
        MemoryProcessor::new(store, Arc::new(scorer), ProcessorConfig::default())
    }

    mod classification {
        use super::*;

        #[test]
        fn test_tier_thresholds() {
            let processor = processor_with(FixedScorer::default());
            assert_eq!(processor.select_tier(0.9), Tier::LongTerm);
            assert_eq!(processor.select_tier(0.8), Tier::LongTerm);
            assert_eq!(processor.select_tier(0.79), Tier::ShortTerm);
            assert_eq!(processor.select_tier(0.4), Tier::ShortTerm);
            assert_eq!(processor.select_tier(0.39), Tier::Working);
            assert_eq!(processor.select_tier(0.0), Tier::Working);
        }

        #[tokio::test]
        async fn test_fixed_scorer_lands_in_short_term() {
            let processor = processor_with(FixedScorer::default());
            let id = processor
                .process(json!({"content": "hello"}), &[], None)
                .await
                .unwrap();

            let stored = processor.store().get(id).await.unwrap();
            assert_eq!(stored.tier, Tier::ShortTerm);
            assert_eq!(stored.importance, 0.5);
        }

        #[tokio::test]
        async fn test_scripted_importance_picks_tier() {
            let processor = processor_with(ScriptedScorer::default());
            let high = processor
                .process(json!({"importance": 0.95}), &[], None)
                .await
                .unwrap();
            let low = processor
                .process(json!({"importance": 0.1}), &[], None)
                .await
                .unwrap();

            assert_eq!(processor.store().get(high).await.unwrap().tier, Tier::LongTerm);
            assert_eq!(processor.store().get(low).await.unwrap().tier, Tier::Working);
        }

        struct FeedbackScorer;

        #[async_trait::async_trait]
        impl ImportanceScorer for FeedbackScorer {
            async fn score(
                &self,
                _information: &Value,
                feedback: Option<f32>,
            ) -> std::result::Result<f32, crate::memory::scorer::ScorerError> {
                Ok(feedback.unwrap_or(0.0))
            }

            fn name(&self) -> &'static str {
                "feedback"
            }
        }

        #[tokio::test]
        async fn test_feedback_reaches_scorer() {
            let processor = processor_with(FeedbackScorer);
            let id = processor.process(json!({}), &[], Some(0.85)).await.unwrap();
            assert_eq!(processor.store().get(id).await.unwrap().importance, 0.85);
        }
    }

    mod tagging {
        use super::*;

        #[test]
        fn test_category_and_context_become_tags() {
            let tags = derive_tags(
                &json!({"category": "meeting", "context": "project  alpha"}),
                &["alpha".to_string(), " ".to_string()],
            );
            let expected: BTreeSet<String> = ["meeting", "project", "alpha"]
                .into_iter()
                .map(String::from)
                .collect();
            assert_eq!(tags, expected);
        }

        #[test]
        fn test_non_string_fields_are_ignored() {
            let tags = derive_tags(&json!({"category": 3, "context": ["a"]}), &[]);
            assert!(tags.is_empty());
        }

        #[tokio::test]
        async fn test_processed_memory_is_searchable_by_tag() {
            let processor = processor_with(FixedScorer::new(0.9));
            let id = processor
                .process(json!({"category": "meeting"}), &["urgent".to_string()], None)
                .await
                .unwrap();

            let hits = processor
                .search(&MemoryQuery::new().with_tags(["urgent"]), None)
                .await;
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].id, id);
        }
    }

    mod rejection {
        use super::*;

        #[tokio::test]
        async fn test_out_of_range_score_stores_nothing() {
            let processor = processor_with(ScriptedScorer::default());
            let result = processor.process(json!({"importance": 1.5}), &[], None).await;

            assert!(matches!(result, Err(RetainError::InvalidItem(_))));
            assert_eq!(processor.stats().await.total, 0);
        }

        #[tokio::test]
        async fn test_scorer_failure_is_propagated() {
            let processor = processor_with(ScriptedScorer::default());
            let result = processor
                .process(json!({"importance": "fail"}), &[], None)
                .await;

            assert!(matches!(result, Err(RetainError::Scorer(_))));
            assert_eq!(processor.stats().await.total, 0);
        }
    }
}
