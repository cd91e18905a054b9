//! Strategy advisors.
//!
//! An advisor looks at an underperforming strategy and proposes revised
//! parameters. [`CompletionAdvisor`] does so by prompting a text-completion
//! service and reading the first JSON object out of its reply.

use crate::strategy::{Strategy, StrategyId, StrategyParameters};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Highest temperature a revision may propose
pub const MAX_TEMPERATURE: f64 = 2.0;

/// Advisor failures. None of them is fatal; the strategy is kept as is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("Advisor unavailable: {0}")]
    Unavailable(String),

    #[error("Advisor timed out after {0}ms")]
    Timeout(u64),

    #[error("Malformed revision: {0}")]
    Malformed(String),
}

/// What an advisor sees of a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy_id: StrategyId,
    pub task_type: String,
    pub generation: u32,
    pub template: String,
    pub temperature: f64,
    pub success_rate: f64,
    pub avg_confidence: f64,
    pub avg_latency_ms: f64,
    pub sample_count: u64,
}

impl From<&Strategy> for StrategySummary {
    fn from(strategy: &Strategy) -> Self {
        Self {
            strategy_id: strategy.id.clone(),
            task_type: strategy.task_type.clone(),
            generation: strategy.generation,
            template: strategy.parameters.template.clone(),
            temperature: strategy.parameters.temperature,
            success_rate: strategy.performance.success_rate,
            avg_confidence: strategy.performance.avg_confidence,
            avg_latency_ms: strategy.performance.avg_latency_ms,
            sample_count: strategy.performance.sample_count,
        }
    }
}

/// Revised parameters proposed by an advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRevision {
    #[serde(alias = "promptTemplate")]
    pub template: String,
    pub temperature: f64,
    /// Merged over the parent's extra parameters
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default, alias = "expectedImprovement")]
    pub expected_improvement: Option<f64>,
}

impl StrategyRevision {
    /// Reject revisions with an empty template or a temperature outside [0, 2]
    pub fn validate(&self) -> Result<(), AdvisorError> {
        if self.template.trim().is_empty() {
            return Err(AdvisorError::Malformed("empty template".to_string()));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(AdvisorError::Malformed(format!(
                "temperature {} outside [0, {MAX_TEMPERATURE}]",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Parameters of the revised strategy
    pub fn apply_to(&self, parent: &StrategyParameters) -> StrategyParameters {
        let mut extra = parent.extra.clone();
        extra.extend(self.parameters.clone());
        StrategyParameters {
            template: self.template.clone(),
            temperature: self.temperature,
            extra,
        }
    }
}

/// Proposes strategy revisions
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, summary: &StrategySummary) -> Result<StrategyRevision, AdvisorError>;
}

/// Text-completion backend used by [`CompletionAdvisor`]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AdvisorError>;
}

/// Advisor backed by a text-completion service
pub struct CompletionAdvisor<C> {
    client: C,
}

impl<C: CompletionClient> CompletionAdvisor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Prompt asking for a revision of `summary`
    pub fn prompt(summary: &StrategySummary) -> String {
        format!(
            "You are analyzing an agent strategy that needs improvement.\n\n\
             Current strategy:\n\
             - Task type: {}\n\
             - Generation: {}\n\
             - Prompt template: {}\n\
             - Temperature: {}\n\
             - Success rate: {:.1}%\n\
             - Average confidence: {:.1}%\n\
             - Average latency: {:.0}ms\n\
             - Samples: {}\n\n\
             Suggest an improved strategy. Reply with JSON only:\n\
             {{\"template\": \"improved prompt template\", \"temperature\": number, \
             \"reasoning\": \"why this will perform better\", \"expected_improvement\": number}}",
            summary.task_type,
            summary.generation,
            summary.template,
            summary.temperature,
            summary.success_rate * 100.0,
            summary.avg_confidence * 100.0,
            summary.avg_latency_ms,
            summary.sample_count,
        )
    }
}

#[async_trait]
impl<C: CompletionClient> Advisor for CompletionAdvisor<C> {
    async fn advise(&self, summary: &StrategySummary) -> Result<StrategyRevision, AdvisorError> {
        let reply = self.client.complete(&Self::prompt(summary)).await?;
        let revision = parse_revision(&reply)?;
        debug!(strategy = %summary.strategy_id, reasoning = ?revision.reasoning, "revision proposed");
        Ok(revision)
    }
}

/// Parse the first JSON object in `reply` as a revision
pub fn parse_revision(reply: &str) -> Result<StrategyRevision, AdvisorError> {
    let start = reply
        .find('{')
        .ok_or_else(|| AdvisorError::Malformed("no JSON object in reply".to_string()))?;

    let value = serde_json::Deserializer::from_str(&reply[start..])
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| AdvisorError::Malformed("no JSON object in reply".to_string()))?
        .map_err(|e| AdvisorError::Malformed(e.to_string()))?;

    let revision: StrategyRevision =
        serde_json::from_value(value).map_err(|e| AdvisorError::Malformed(e.to_string()))?;
    revision.validate()?;
    Ok(revision)
}
