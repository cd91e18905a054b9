//! Self-improvement of underperforming strategies.
//!
//! The loop asks an [`Advisor`] for a revision and stores it as the next
//! generation. The advisor runs without any store guard held and under a
//! timeout. On any failure the input strategy is returned unchanged.

use crate::{
    advisor::{Advisor, AdvisorError, StrategySummary},
    error::SwarmResult,
    monitoring,
    strategy::{Strategy, StrategyId, StrategyStore},
};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Improvement loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementConfig {
    pub advisor_timeout_ms: u64,
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            advisor_timeout_ms: 30_000,
        }
    }
}

/// Revises strategies through an advisor
pub struct ImprovementLoop {
    store: Arc<StrategyStore>,
    advisor: Arc<dyn Advisor>,
    config: ImprovementConfig,
    in_flight: DashSet<StrategyId>,
}

impl ImprovementLoop {
    pub fn new(store: Arc<StrategyStore>, advisor: Arc<dyn Advisor>, config: ImprovementConfig) -> Self {
        Self {
            store,
            advisor,
            config,
            in_flight: DashSet::new(),
        }
    }

    pub fn store(&self) -> &Arc<StrategyStore> {
        &self.store
    }

    /// Ask the advisor to revise `strategy`.
    ///
    /// Returns the new generation on success. Returns `strategy` unchanged
    /// when the advisor fails, times out or proposes a malformed revision,
    /// when the strategy has already been revised, or when another revision
    /// of it is in progress.
    pub async fn request_improvement(&self, strategy: &Strategy) -> Strategy {
        if self.store.is_superseded(&strategy.id) {
            debug!(strategy = %strategy.id, "strategy already revised");
            monitoring::record_improvement("skipped");
            return strategy.clone();
        }
        let Some(_claim) = InFlight::claim(&self.in_flight, &strategy.id) else {
            debug!(strategy = %strategy.id, "revision already in progress");
            monitoring::record_improvement("skipped");
            return strategy.clone();
        };

        let result = self.revise(strategy).await;

        match result {
            Ok(revised) => revised,
            Err(e) => {
                warn!(strategy = %strategy.id, error = %e, "strategy improvement failed");
                monitoring::record_improvement("failed");
                strategy.clone()
            }
        }
    }

    /// Revise strategy `id` if it is due; returns the new generation if one
    /// was stored
    pub async fn improve_if_due(&self, id: &str) -> SwarmResult<Option<Strategy>> {
        if !self.store.should_improve(id)? {
            return Ok(None);
        }
        let Some(current) = self.store.get(id) else {
            return Ok(None);
        };

        let revised = self.request_improvement(&current).await;
        Ok((revised.id != current.id).then_some(revised))
    }

    async fn revise(&self, strategy: &Strategy) -> Result<Strategy, AdvisorError> {
        let summary = StrategySummary::from(strategy);
        let limit = Duration::from_millis(self.config.advisor_timeout_ms);

        let revision = timeout(limit, self.advisor.advise(&summary))
            .await
            .map_err(|_| AdvisorError::Timeout(self.config.advisor_timeout_ms))??;
        revision.validate()?;

        // The store may have moved on while the advisor was thinking
        if self.store.is_superseded(&strategy.id) {
            debug!(strategy = %strategy.id, "revision discarded, strategy revised concurrently");
            monitoring::record_improvement("skipped");
            return Ok(strategy.clone());
        }

        let revised = self
            .store
            .commit_revision(strategy, revision.apply_to(&strategy.parameters));

        info!(
            task_type = %revised.task_type,
            previous = %strategy.id,
            current = %revised.id,
            generation = revised.generation,
            reasoning = ?revision.reasoning,
            "strategy improved"
        );
        monitoring::record_improvement("committed");
        Ok(revised)
    }
}

/// Marks a strategy as being revised until dropped
struct InFlight<'a> {
    set: &'a DashSet<StrategyId>,
    id: StrategyId,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a DashSet<StrategyId>, id: &str) -> Option<Self> {
        set.insert(id.to_string()).then(|| Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::StrategyRevision;
    use crate::strategy::StrategyParameters;
    use async_trait::async_trait;

    struct Scripted(Result<StrategyRevision, AdvisorError>);

    #[async_trait]
    impl Advisor for Scripted {
        async fn advise(&self, _summary: &StrategySummary) -> Result<StrategyRevision, AdvisorError> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl Advisor for Stalled {
        async fn advise(&self, _summary: &StrategySummary) -> Result<StrategyRevision, AdvisorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(AdvisorError::Unavailable("unreachable".into()))
        }
    }

    fn revision(template: &str, temperature: f64) -> StrategyRevision {
        StrategyRevision {
            template: template.into(),
            temperature,
            parameters: Default::default(),
            reasoning: None,
            expected_improvement: None,
        }
    }

    fn setup(advisor: impl Advisor + 'static, timeout_ms: u64) -> (ImprovementLoop, Strategy) {
        let store = Arc::new(StrategyStore::default());
        let strategy = store.create("discover", StrategyParameters::new("Find {topic}"));
        let improver = ImprovementLoop::new(
            store,
            Arc::new(advisor),
            ImprovementConfig {
                advisor_timeout_ms: timeout_ms,
            },
        );
        (improver, strategy)
    }

    #[tokio::test]
    async fn test_success_creates_next_generation() {
        let (improver, strategy) = setup(Scripted(Ok(revision("Find recent {topic}", 0.5))), 1000);
        let revised = improver.request_improvement(&strategy).await;

        assert_eq!(revised.generation, 2);
        assert_eq!(revised.parent.as_deref(), Some(strategy.id.as_str()));
        assert_eq!(revised.parameters.template, "Find recent {topic}");
        assert_eq!(revised.performance.sample_count, 0);
        assert_eq!(improver.store().len(), 2);
    }

    #[tokio::test]
    async fn test_superseded_strategy_is_not_revised_twice() {
        let (improver, strategy) = setup(Scripted(Ok(revision("v2", 0.5))), 1000);
        let first = improver.request_improvement(&strategy).await;
        let second = improver.request_improvement(&strategy).await;

        assert_ne!(first.id, strategy.id);
        assert_eq!(second.id, strategy.id);
        assert_eq!(improver.store().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_revision_is_ignored() {
        let (improver, strategy) = setup(Scripted(Ok(revision("  ", 0.5))), 1000);
        assert_eq!(improver.request_improvement(&strategy).await, strategy);
        assert_eq!(improver.store().len(), 1);
    }

    #[tokio::test]
    async fn test_advisor_timeout_leaves_store_untouched() {
        let (improver, strategy) = setup(Stalled, 50);
        assert_eq!(improver.request_improvement(&strategy).await, strategy);
        assert_eq!(improver.store().len(), 1);
    }

    #[tokio::test]
    async fn test_improve_if_due_requires_samples() {
        let (improver, strategy) = setup(Scripted(Ok(revision("v2", 0.5))), 1000);
        for _ in 0..5 {
            improver
                .store()
                .record_outcome(&strategy.id, false, 0.2, Duration::from_millis(10))
                .unwrap();
        }
        assert!(improver.improve_if_due(&strategy.id).await.unwrap().is_none());

        for _ in 0..6 {
            improver
                .store()
                .record_outcome(&strategy.id, false, 0.2, Duration::from_millis(10))
                .unwrap();
        }
        let revised = improver.improve_if_due(&strategy.id).await.unwrap().unwrap();
        assert_eq!(revised.generation, 2);
    }
}
