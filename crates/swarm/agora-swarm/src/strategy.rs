//! Versioned strategies and their rolling performance.
//!
//! Strategies are append-only: a revision is stored as a new strategy one
//! generation above its parent, and superseded generations stay queryable.

use crate::{
    error::{SwarmError, SwarmResult},
    monitoring::{self, ImprovementStats},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Identifier of a strategy
pub type StrategyId = String;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

const SUCCESS_WEIGHT: f64 = 0.6;
const CONFIDENCE_WEIGHT: f64 = 0.3;
const LATENCY_WEIGHT: f64 = 0.1;

/// Parameters handed to an agent executing a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub template: String,
    pub temperature: f64,
    /// Free-form parameters, carried through revisions
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StrategyParameters {
    /// Parameters with the default temperature
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            temperature: DEFAULT_TEMPERATURE,
            extra: serde_json::Map::new(),
        }
    }
}

/// Rolling performance of a strategy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// 0..=1
    pub success_rate: f64,
    /// 0..=1
    pub avg_confidence: f64,
    pub avg_latency_ms: f64,
    pub sample_count: u64,
}

impl Performance {
    fn record(&mut self, success: bool, confidence: f64, latency_ms: f64) {
        let n = self.sample_count as f64;
        let mean = |old: f64, x: f64| (old * n + x) / (n + 1.0);

        self.success_rate = mean(self.success_rate, if success { 1.0 } else { 0.0 });
        self.avg_confidence = mean(self.avg_confidence, confidence);
        self.avg_latency_ms = mean(self.avg_latency_ms, latency_ms);
        self.sample_count += 1;
    }
}

/// One generation of a task strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    /// Starts at 1
    pub generation: u32,
    pub parent: Option<StrategyId>,
    pub task_type: String,
    pub parameters: StrategyParameters,
    pub performance: Performance,
    pub created_at: DateTime<Utc>,
}

/// Strategy store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Samples a strategy needs (strictly more than) before it is judged
    pub min_samples: u64,
    /// Success rate below which a judged strategy is revised
    pub improvement_threshold: f64,
    /// Latency that normalizes to 1.0 in the ranking score
    pub latency_ceiling_ms: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            improvement_threshold: 0.75,
            latency_ceiling_ms: 10_000.0,
        }
    }
}

/// Concurrent store of every strategy generation
#[derive(Default)]
pub struct StrategyStore {
    strategies: DashMap<StrategyId, Strategy>,
    /// Strategy ids per task type, oldest first
    lineage: DashMap<String, Vec<StrategyId>>,
    config: StrategyConfig,
}

impl StrategyStore {
    pub fn new(config: StrategyConfig) -> Self {
        Self {
            strategies: DashMap::new(),
            lineage: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Store a first-generation strategy for `task_type`
    pub fn create(&self, task_type: impl Into<String>, parameters: StrategyParameters) -> Strategy {
        let task_type = task_type.into();
        let strategy = Strategy {
            id: new_id(&task_type),
            generation: 1,
            parent: None,
            task_type,
            parameters,
            performance: Performance::default(),
            created_at: Utc::now(),
        };
        info!(strategy = %strategy.id, task_type = %strategy.task_type, "strategy created");
        self.insert(strategy.clone());
        strategy
    }

    /// Newest strategy for `task_type`, creating one from `template` if none exists
    pub fn ensure(&self, task_type: &str, template: &str) -> Strategy {
        match self.latest(task_type) {
            Some(strategy) => strategy,
            None => self.create(task_type, StrategyParameters::new(template)),
        }
    }

    pub fn get(&self, id: &str) -> Option<Strategy> {
        self.strategies.get(id).map(|entry| entry.clone())
    }

    /// Newest generation for a task type
    pub fn latest(&self, task_type: &str) -> Option<Strategy> {
        let id = self.lineage.get(task_type)?.last().cloned()?;
        self.get(&id)
    }

    /// Every generation for a task type, oldest first
    pub fn history(&self, task_type: &str) -> Vec<Strategy> {
        let ids = self
            .lineage
            .get(task_type)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Fold one task outcome into a strategy's running means.
    ///
    /// `confidence` is a fraction and is clamped to [0, 1].
    pub fn record_outcome(
        &self,
        id: &str,
        success: bool,
        confidence: f64,
        latency: Duration,
    ) -> SwarmResult<Performance> {
        let mut entry = self
            .strategies
            .get_mut(id)
            .ok_or_else(|| SwarmError::UnknownStrategy(id.to_string()))?;

        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        entry
            .performance
            .record(success, confidence, latency.as_secs_f64() * 1000.0);

        let performance = entry.performance.clone();
        let task_type = entry.task_type.clone();
        drop(entry);

        debug!(strategy = id, success, samples = performance.sample_count, "outcome recorded");
        monitoring::record_outcome(&task_type, success);
        Ok(performance)
    }

    /// Check whether a strategy has enough samples and underperforms
    pub fn should_improve(&self, id: &str) -> SwarmResult<bool> {
        let strategy = self
            .strategies
            .get(id)
            .ok_or_else(|| SwarmError::UnknownStrategy(id.to_string()))?;

        let performance = &strategy.performance;
        Ok(performance.sample_count > self.config.min_samples
            && performance.success_rate < self.config.improvement_threshold)
    }

    /// Ranking score of a strategy; higher is better
    pub fn score(&self, strategy: &Strategy) -> f64 {
        let performance = &strategy.performance;
        let latency = if self.config.latency_ceiling_ms > 0.0 {
            (performance.avg_latency_ms / self.config.latency_ceiling_ms).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SUCCESS_WEIGHT * performance.success_rate + CONFIDENCE_WEIGHT * performance.avg_confidence
            - LATENCY_WEIGHT * latency
    }

    /// Highest-scoring strategy for `task_type` among those with enough samples
    pub fn best_strategy(&self, task_type: &str) -> Option<Strategy> {
        self.history(task_type)
            .into_iter()
            .filter(|s| s.performance.sample_count > self.config.min_samples)
            .max_by(|a, b| self.score(a).total_cmp(&self.score(b)))
    }

    /// Check whether a revision of `id` has already been stored
    pub fn is_superseded(&self, id: &str) -> bool {
        self.strategies
            .iter()
            .any(|entry| entry.parent.as_deref() == Some(id))
    }

    pub fn improvement_stats(&self) -> ImprovementStats {
        let strategies: Vec<Strategy> = self.strategies.iter().map(|e| e.clone()).collect();
        if strategies.is_empty() {
            return ImprovementStats::default();
        }

        let total = strategies.len() as f64;
        let revisions = strategies.iter().filter(|s| s.generation > 1).count() as f64;

        ImprovementStats {
            total_strategies: strategies.len(),
            avg_generation: strategies.iter().map(|s| f64::from(s.generation)).sum::<f64>() / total,
            best_success_rate: strategies
                .iter()
                .map(|s| s.performance.success_rate)
                .fold(0.0, f64::max),
            improvement_rate: revisions / total,
        }
    }

    /// Store a revision of `parent` as the next generation
    pub(crate) fn commit_revision(&self, parent: &Strategy, parameters: StrategyParameters) -> Strategy {
        let strategy = Strategy {
            id: new_id(&parent.task_type),
            generation: parent.generation + 1,
            parent: Some(parent.id.clone()),
            task_type: parent.task_type.clone(),
            parameters,
            performance: Performance::default(),
            created_at: Utc::now(),
        };
        self.insert(strategy.clone());
        strategy
    }

    fn insert(&self, strategy: Strategy) {
        let id = strategy.id.clone();
        let task_type = strategy.task_type.clone();
        self.strategies.insert(id.clone(), strategy);
        self.lineage.entry(task_type).or_default().push(id);
    }
}

fn new_id(task_type: &str) -> StrategyId {
    format!("strategy_{}_{}", task_type, Uuid::new_v4().simple())
}
