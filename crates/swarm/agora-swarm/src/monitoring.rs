//! Metrics and statistics for the collective.
//!
//! Counters and histograms go through the `metrics` facade; nothing is
//! exported unless the embedding process installs a recorder. The snapshot
//! structs back dashboards and tests.

use crate::{
    consensus::Decision,
    protocol::MessageKind,
    types::AgentId,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const MESSAGES_SENT: &str = "agora_messages_sent_total";
pub const TASKS_ROUTED: &str = "agora_tasks_routed_total";
pub const TASKS_UNROUTABLE: &str = "agora_tasks_unroutable_total";
pub const CONSENSUS_ROUNDS: &str = "agora_consensus_rounds_total";
pub const CONSENSUS_DURATION: &str = "agora_consensus_duration_seconds";
pub const VERIFIER_ABSTENTIONS: &str = "agora_verifier_abstentions_total";
pub const STRATEGY_OUTCOMES: &str = "agora_strategy_outcomes_total";
pub const STRATEGY_IMPROVEMENTS: &str = "agora_strategy_improvements_total";
pub const SETTLEMENTS: &str = "agora_settlements_total";

pub(crate) fn record_message(kind: MessageKind) {
    counter!(MESSAGES_SENT, "kind" => kind.to_string()).increment(1);
}

pub(crate) fn record_route(task_type: &str, routed: bool) {
    let name = if routed { TASKS_ROUTED } else { TASKS_UNROUTABLE };
    counter!(name, "task_type" => task_type.to_string()).increment(1);
}

pub(crate) fn record_round(decision: Decision, abstentions: usize, elapsed: Duration) {
    let label = match decision {
        Decision::Accepted => "accepted",
        Decision::Rejected => "rejected",
    };
    counter!(CONSENSUS_ROUNDS, "decision" => label).increment(1);
    histogram!(CONSENSUS_DURATION).record(elapsed.as_secs_f64());
    if abstentions > 0 {
        counter!(VERIFIER_ABSTENTIONS).increment(abstentions as u64);
    }
}

pub(crate) fn record_outcome(task_type: &str, success: bool) {
    let label = if success { "success" } else { "failure" };
    counter!(STRATEGY_OUTCOMES, "task_type" => task_type.to_string(), "outcome" => label).increment(1);
}

pub(crate) fn record_improvement(outcome: &'static str) {
    counter!(STRATEGY_IMPROVEMENTS, "outcome" => outcome).increment(1);
}

pub(crate) fn record_settlement(success: bool) {
    let label = if success { "success" } else { "failure" };
    counter!(SETTLEMENTS, "outcome" => label).increment(1);
}

/// Communication statistics of the hub
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HubStats {
    pub total_agents: usize,
    /// Agents currently Active or Busy
    pub active_agents: usize,
    pub total_messages: usize,
    /// Messages sent, keyed by sender
    pub messages_per_sender: BTreeMap<AgentId, usize>,
}

/// Aggregated message traffic between two agents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: AgentId,
    pub to: AgentId,
    pub count: usize,
}

/// Summary of strategy evolution across all task types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementStats {
    pub total_strategies: usize,
    pub avg_generation: f64,
    /// Highest success rate of any strategy
    pub best_success_rate: f64,
    /// Share of strategies that are revisions (generation > 1)
    pub improvement_rate: f64,
}
