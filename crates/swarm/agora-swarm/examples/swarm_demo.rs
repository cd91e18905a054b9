//! Demonstration of routing, stake-weighted consensus and strategy improvement

use agora_core::init_tracing;
use agora_swarm::prelude::*;
use agora_swarm::{
    AdvisorError, CompletionAdvisor, CompletionClient, InMemorySettlement, StaticLinkProbe, StaticSource, ENV_PREFIX,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Offline stand-in for an inference service
struct CannedCompletion;

#[async_trait]
impl CompletionClient for CannedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, AdvisorError> {
        Ok(r#"{"template": "Find well-documented open projects about {topic}", "temperature": 0.5, "reasoning": "weak candidates lacked documentation"}"#.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = SwarmSettings::load(None, ENV_PREFIX)?;
    init_tracing(&settings.logging)?;

    info!("🚀 Starting Agora swarm demo");

    let pool = SwarmCoordinator::heuristic_pool(
        &settings,
        5,
        Arc::new(StaticLinkProbe::always()),
        &settings.stake.source(),
    )
    .await?;
    for (name, stake) in pool.stakes() {
        info!(verifier = %name, stake, "verifier joined pool");
    }

    let ledger = Arc::new(InMemorySettlement::new());
    let swarm = SwarmCoordinator::new(settings, pool, Arc::new(CompletionAdvisor::new(CannedCompletion)))?
        .with_settlement(ledger.clone());

    swarm.register_agent(AgentId::from("scout-1"), AgentRole::Scout, ["discover"])?;
    swarm.register_agent(AgentId::from("scout-2"), AgentRole::Scout, ["discover"])?;
    swarm.register_agent(AgentId::from("executor-1"), AgentRole::Executor, ["execute"])?;
    info!("✅ Registered {} agents", swarm.registry().len());

    let strategy = swarm.strategies().ensure("discover", "Find open projects about {topic}");

    // Route a discovery task and judge what the scout brings back
    let TaskRoute::Routed { agent_id, task_id, .. } = swarm.dispatch("discover", serde_json::json!({"topic": "solar"}))
    else {
        warn!("no scout available");
        return Ok(());
    };
    info!(%agent_id, %task_id, "📋 Discovery task routed");

    let candidate = Candidate::new(
        "solar-map",
        "Community solar mapping toolkit",
        "Open tooling for mapping rooftop solar potential with public satellite imagery.",
    )
    .with_url("https://github.com/example/solar-map")
    .with_prior_score(82.0);

    let result = swarm.verify_candidate(&agent_id, &strategy.id, &candidate).await?;
    info!(decision = ?result.decision, "🗳️  {}", result.rationale);

    if result.is_accepted() {
        let receipt = swarm.settle(&result, 100).await?;
        info!(reference = %receipt.reference, "💰 Candidate settled");
    }

    // A run of weak candidates drags the strategy below the improvement threshold
    for i in 0..11 {
        let weak = Candidate::new(format!("weak-{i}"), "stub", "todo");
        swarm.verify_candidate(&agent_id, &strategy.id, &weak).await?;
    }
    if let Some(latest) = swarm.strategies().latest("discover") {
        info!(
            generation = latest.generation,
            template = %latest.parameters.template,
            "🔄 Current discovery strategy"
        );
    }

    // Bulk verification
    let source = StaticSource::new(vec![
        candidate.clone(),
        Candidate::new("thin", "Unclear", "n/a"),
    ]);
    let batch = swarm.discover(&source, 10, BatchMode::Parallel).await?;
    for (id, result) in &batch {
        info!(candidate = %id, accepted = result.is_accepted(), ratio = result.approval_ratio, "batch decision");
    }

    let stats = swarm.router().stats();
    let improvement = swarm.strategies().improvement_stats();
    info!(
        agents = stats.total_agents,
        messages = stats.total_messages,
        strategies = improvement.total_strategies,
        settled = ledger.ledger().len(),
        events = swarm.events().len(),
        "📊 Demo finished"
    );

    Ok(())
}
