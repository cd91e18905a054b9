//! Swarm coordinator wiring routing, consensus and strategy improvement
//!
//! The coordinator owns every component of the collective and drives the
//! task flow: a task is routed to an idle agent, the agent's candidate is put
//! to the verifier pool, the decision is recorded against the strategy the
//! agent used and the strategy is revised when it underperforms.

use crate::{
    advisor::Advisor,
    consensus::{BatchMode, ConsensusEngine, ConsensusResult, VerifierPool},
    error::{SwarmError, SwarmResult},
    improvement::ImprovementLoop,
    monitoring,
    registry::AgentRegistry,
    router::{MessageRouter, TaskRoute},
    settings::SwarmSettings,
    settlement::{Settlement, SettlementError, SettlementReceipt},
    source::CandidateSource,
    stake::StakeSource,
    strategy::StrategyStore,
    types::{AgentId, AgentInfo, AgentRole, AgentStatus, Candidate, CandidateId, SwarmEvent},
    verification::{HeuristicVerifier, LinkProbe, Verifier},
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

/// Main coordinator for the collective
pub struct SwarmCoordinator {
    settings: SwarmSettings,
    registry: Arc<AgentRegistry>,
    router: Arc<MessageRouter>,
    consensus: Arc<ConsensusEngine>,
    strategies: Arc<StrategyStore>,
    improvement: Arc<ImprovementLoop>,
    settlement: Option<Arc<dyn Settlement>>,
    events: RwLock<Vec<SwarmEvent>>,
}

impl SwarmCoordinator {
    /// Create a coordinator around a verifier pool and a strategy advisor
    pub fn new(settings: SwarmSettings, pool: VerifierPool, advisor: Arc<dyn Advisor>) -> SwarmResult<Self> {
        let registry = Arc::new(AgentRegistry::new());
        let router = Arc::new(MessageRouter::with_config(registry.clone(), settings.router.clone()));
        let consensus = Arc::new(ConsensusEngine::new(pool, settings.consensus.clone())?);
        let strategies = Arc::new(StrategyStore::new(settings.strategy.clone()));
        let improvement = Arc::new(ImprovementLoop::new(
            strategies.clone(),
            advisor,
            settings.improvement.clone(),
        ));

        info!(
            verifiers = consensus.pool().len(),
            threshold = settings.consensus.threshold,
            "swarm coordinator created"
        );

        Ok(Self {
            settings,
            registry,
            router,
            consensus,
            strategies,
            improvement,
            settlement: None,
            events: RwLock::new(Vec::new()),
        })
    }

    /// Attach a settlement backend
    pub fn with_settlement(mut self, settlement: Arc<dyn Settlement>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    /// Pool of `count` heuristic verifiers named `verifier-1..=count`
    pub async fn heuristic_pool(
        settings: &SwarmSettings,
        count: usize,
        probe: Arc<dyn LinkProbe>,
        stakes: &dyn StakeSource,
    ) -> SwarmResult<VerifierPool> {
        let verifiers: Vec<Arc<dyn Verifier>> = (1..=count)
            .map(|i| {
                Arc::new(HeuristicVerifier::new(
                    format!("verifier-{i}"),
                    settings.heuristics.clone(),
                    probe.clone(),
                )) as Arc<dyn Verifier>
            })
            .collect();

        VerifierPool::assemble(verifiers, stakes).await
    }

    pub fn settings(&self) -> &SwarmSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn consensus(&self) -> &Arc<ConsensusEngine> {
        &self.consensus
    }

    pub fn strategies(&self) -> &Arc<StrategyStore> {
        &self.strategies
    }

    pub fn improvement(&self) -> &Arc<ImprovementLoop> {
        &self.improvement
    }

    /// Register an agent with the collective
    pub fn register_agent<I, S>(&self, id: AgentId, role: AgentRole, capabilities: I) -> SwarmResult<AgentInfo>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let info = self.registry.register(id, role, capabilities)?;
        self.push_event(SwarmEvent::AgentJoined {
            agent_id: info.id.clone(),
            role: info.role.clone(),
            timestamp: Utc::now(),
        });
        Ok(info)
    }

    /// Route a task to an idle agent serving `task_type`
    pub fn dispatch(&self, task_type: &str, payload: serde_json::Value) -> TaskRoute {
        let route = self.router.route_task(task_type, payload);
        let event = match &route {
            TaskRoute::Routed { agent_id, .. } => SwarmEvent::TaskRouted {
                task_type: task_type.to_string(),
                agent_id: agent_id.clone(),
                timestamp: Utc::now(),
            },
            TaskRoute::NoAvailableAgent { task_type } => SwarmEvent::TaskUnroutable {
                task_type: task_type.clone(),
                timestamp: Utc::now(),
            },
        };
        self.push_event(event);
        route
    }

    /// Put the candidate produced by `agent_id` with `strategy_id` to consensus.
    ///
    /// The decision is recorded as an outcome of the strategy (success means
    /// accepted), the agent is set back to Idle and the strategy is revised
    /// if it is due.
    pub async fn verify_candidate(
        &self,
        agent_id: &AgentId,
        strategy_id: &str,
        candidate: &Candidate,
    ) -> SwarmResult<ConsensusResult> {
        if self.registry.get(agent_id).is_none() {
            return Err(SwarmError::UnknownAgent(agent_id.clone()));
        }
        if self.strategies.get(strategy_id).is_none() {
            return Err(SwarmError::UnknownStrategy(strategy_id.to_string()));
        }

        let started = Instant::now();
        let result = self.consensus.decide(candidate).await;

        self.strategies.record_outcome(
            strategy_id,
            result.is_accepted(),
            result.avg_confidence / 100.0,
            started.elapsed(),
        )?;
        self.registry.update_status(agent_id, AgentStatus::Idle)?;
        self.record_decision(&result);

        if let Some(revised) = self.improvement.improve_if_due(strategy_id).await? {
            self.push_event(SwarmEvent::StrategyImproved {
                task_type: revised.task_type.clone(),
                previous: strategy_id.to_string(),
                current: revised.id.clone(),
                generation: revised.generation,
                timestamp: Utc::now(),
            });
        }

        Ok(result)
    }

    /// Pull up to `limit` candidates from `source` and decide each of them
    pub async fn discover(
        &self,
        source: &dyn CandidateSource,
        limit: usize,
        mode: BatchMode,
    ) -> SwarmResult<HashMap<CandidateId, ConsensusResult>> {
        let mut candidates = source.fetch(limit).await?;
        info!(fetched = candidates.len(), limit, "candidates fetched");
        if candidates.len() > limit {
            warn!(fetched = candidates.len(), limit, "source exceeded limit, extra candidates dropped");
            candidates.truncate(limit);
        }

        let results = self.consensus.verify_batch(&candidates, mode).await;
        for result in results.values() {
            self.record_decision(result);
        }
        Ok(results)
    }

    /// Settle an accepted candidate through the settlement backend
    pub async fn settle(&self, result: &ConsensusResult, amount: u64) -> SwarmResult<SettlementReceipt> {
        if !result.is_accepted() {
            return Err(SwarmError::NotAccepted(result.candidate_id.clone()));
        }
        let settlement = self
            .settlement
            .as_ref()
            .ok_or_else(|| SwarmError::InvalidConfiguration("no settlement backend configured".to_string()))?;

        let limit = self.settings.settlement.timeout();
        let outcome = timeout(limit, settlement.settle(result, amount))
            .await
            .unwrap_or(Err(SettlementError::Timeout(self.settings.settlement.timeout_ms)));

        let receipt = match outcome {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(candidate = %result.candidate_id, error = %e, "settlement failed");
                monitoring::record_settlement(false);
                return Err(e.into());
            }
        };

        monitoring::record_settlement(receipt.success);
        info!(candidate = %result.candidate_id, amount, reference = %receipt.reference, "candidate settled");
        self.push_event(SwarmEvent::Settled {
            candidate_id: result.candidate_id.clone(),
            success: receipt.success,
            reference: receipt.reference.clone(),
            timestamp: Utc::now(),
        });
        Ok(receipt)
    }

    /// Every event recorded so far, oldest first
    pub fn events(&self) -> Vec<SwarmEvent> {
        self.events.read().clone()
    }

    fn record_decision(&self, result: &ConsensusResult) {
        self.push_event(SwarmEvent::CandidateDecided {
            candidate_id: result.candidate_id.clone(),
            accepted: result.is_accepted(),
            approval_ratio: result.approval_ratio,
            timestamp: Utc::now(),
        });
    }

    fn push_event(&self, event: SwarmEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{AdvisorError, StrategyRevision, StrategySummary};
    use crate::stake::FixedStake;
    use crate::verification::StaticLinkProbe;
    use async_trait::async_trait;

    struct NoAdvice;

    #[async_trait]
    impl Advisor for NoAdvice {
        async fn advise(&self, _summary: &StrategySummary) -> Result<StrategyRevision, AdvisorError> {
            Err(AdvisorError::Unavailable("offline".into()))
        }
    }

    async fn coordinator() -> SwarmCoordinator {
        let settings = SwarmSettings::default();
        let pool = SwarmCoordinator::heuristic_pool(
            &settings,
            3,
            Arc::new(StaticLinkProbe::always()),
            &FixedStake::uniform(1000.0),
        )
        .await
        .unwrap();
        SwarmCoordinator::new(settings, pool, Arc::new(NoAdvice)).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_dispatch_record_events() {
        let swarm = coordinator().await;
        swarm
            .register_agent(AgentId::from("scout-1"), AgentRole::Scout, ["discover"])
            .unwrap();

        assert!(matches!(
            swarm.dispatch("discover", serde_json::json!({})),
            TaskRoute::Routed { .. }
        ));
        assert!(matches!(
            swarm.dispatch("discover", serde_json::json!({})),
            TaskRoute::NoAvailableAgent { .. }
        ));

        let events = swarm.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SwarmEvent::AgentJoined { .. }));
        assert!(matches!(events[1], SwarmEvent::TaskRouted { .. }));
        assert!(matches!(events[2], SwarmEvent::TaskUnroutable { .. }));
    }

    #[tokio::test]
    async fn test_verify_candidate_checks_inputs() {
        let swarm = coordinator().await;
        let candidate = Candidate::new("c1", "title", "desc");

        let err = swarm
            .verify_candidate(&AgentId::from("ghost"), "s", &candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownAgent(_)));

        swarm
            .register_agent(AgentId::from("scout-1"), AgentRole::Scout, ["discover"])
            .unwrap();
        let err = swarm
            .verify_candidate(&AgentId::from("scout-1"), "missing", &candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn test_settle_without_backend() {
        let swarm = coordinator().await;
        let candidate = Candidate::new("c1", "Well described project", "d".repeat(60))
            .with_url("https://github.com/org/repo")
            .with_prior_score(90.0);
        let result = swarm.consensus().decide(&candidate).await;
        assert!(result.is_accepted());

        let err = swarm.settle(&result, 10).await.unwrap_err();
        assert!(matches!(err, SwarmError::InvalidConfiguration(_)));
    }
}
