//! Importance scorer trait
//!
//! Scoring is pluggable: the store only relies on the contract
//! "payload (plus optional feedback) -> importance in `[0, 1]`".

use async_trait::async_trait;
use serde_json::Value;

/// Scorer-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("Scorer unavailable: {0}")]
    Unavailable(String),
    #[error("Scoring failed: {0}")]
    Failed(String),
}

/// Trait for importance scorers (heuristics, remote models, learned policies)
#[async_trait]
pub trait ImportanceScorer: Send + Sync {
    /// Score a payload.
    ///
    /// `feedback` is an optional numeric signal from an external learning
    /// loop; it is passed through untouched. The returned value must lie in
    /// `[0, 1]`, anything else is rejected by the processor.
    async fn score(&self, information: &Value, feedback: Option<f32>) -> Result<f32, ScorerError>;

    /// Scorer name for logging
    fn name(&self) -> &'static str;
}

/// Placeholder scorer that assigns the same importance to everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScorer {
    importance: f32,
}

impl FixedScorer {
    pub fn new(importance: f32) -> Self {
        Self { importance }
    }

    pub fn importance(&self) -> f32 {
        self.importance
    }
}

impl Default for FixedScorer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[async_trait]
impl ImportanceScorer for FixedScorer {
    async fn score(&self, _information: &Value, _feedback: Option<f32>) -> Result<f32, ScorerError> {
        Ok(self.importance)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
