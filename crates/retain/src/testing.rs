//! Test utilities for retain - item builders and a scripted scorer
//!
//! Shared by the unit tests, the integration tests and the CLI tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use crate::memory::scorer::{ImportanceScorer, ScorerError};
use crate::memory::types::{MemoryItem, Tier};

/// Build a memory with the given importance and tier.
///
/// Panics on out-of-range importance; use `MemoryItem::new` to test rejection.
pub fn item(importance: f32, tier: Tier) -> MemoryItem {
    MemoryItem::new(json!({"content": "test memory"}), importance, tier)
        .expect("test helper requires importance in [0, 1]")
}

/// Build a memory carrying `tags`
pub fn tagged(importance: f32, tier: Tier, tags: &[&str]) -> MemoryItem {
    item(importance, tier).with_tags(tags.iter().copied())
}

/// Build a memory labelled with a sequence number in its content
pub fn numbered(n: usize, importance: f32, tier: Tier) -> MemoryItem {
    let mut memory = item(importance, tier);
    memory.content = json!({"content": format!("memory {n}"), "n": n});
    memory
}

/// Pretend `memory` was last accessed `days` days ago
pub fn idle_for(mut memory: MemoryItem, days: i64) -> MemoryItem {
    memory.last_access = Utc::now() - Duration::days(days);
    memory
}

/// Scorer for tests: reads the importance from the payload's `"importance"`
/// field, falling back to a default. Returns whatever number it finds, even
/// out of range, so rejection paths can be exercised.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedScorer {
    fallback: f32,
}

impl ScriptedScorer {
    pub fn new(fallback: f32) -> Self {
        Self { fallback }
    }
}

impl Default for ScriptedScorer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl ImportanceScorer for ScriptedScorer {
    async fn score(&self, information: &Value, _feedback: Option<f32>) -> Result<f32, ScorerError> {
        match information.get("importance") {
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(f64::NAN) as f32),
            Some(Value::String(s)) if s == "fail" => {
                Err(ScorerError::Failed("scripted failure".to_string()))
            }
            _ => Ok(self.fallback),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
