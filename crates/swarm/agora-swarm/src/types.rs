//! Common types for swarm coordination

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque, caller-chosen identifier of an agent (e.g. `scout-1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create an agent id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AgentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Sender used for messages originating from the hub itself
pub const SYSTEM_SENDER: &str = "system";

/// Identifier of a candidate under verification
pub type CandidateId = String;

/// Agent role in the collective
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Discovers candidates
    Scout,
    /// Judges candidates
    Verifier,
    /// Acts on accepted candidates
    Executor,
    /// Role outside the built-in set
    Custom(String),
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Scout => f.write_str("scout"),
            AgentRole::Verifier => f.write_str("verifier"),
            AgentRole::Executor => f.write_str("executor"),
            AgentRole::Custom(name) => f.write_str(name),
        }
    }
}

/// Current status of an agent.
///
/// Any status may follow any other; the registry does not enforce a state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Available for routing
    Idle,
    /// Working on a routed task
    Busy,
    /// Running on its own initiative
    Active,
}

/// Point-in-time view of a registered agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub role: AgentRole,
    pub status: AgentStatus,
    pub capabilities: BTreeSet<String>,
    /// Messages waiting in the agent's inbound queue
    pub queue_depth: usize,
    pub registered_at: DateTime<Utc>,
}

impl AgentInfo {
    /// Check whether the agent serves a task type
    pub fn can_serve(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// An item proposed for acceptance.
///
/// Produced by a candidate source, judged by the verifier pool, never mutated
/// by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub title: String,
    pub description: String,
    /// Source link backing the candidate, if any
    pub url: Option<String>,
    /// Heuristic score assigned upstream, 0..=100
    pub prior_score: f64,
}

impl Candidate {
    /// Create a candidate without a source link
    pub fn new(id: impl Into<CandidateId>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            url: None,
            prior_score: 0.0,
        }
    }

    /// Attach a source link
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the upstream score
    pub fn with_prior_score(mut self, score: f64) -> Self {
        self.prior_score = score;
        self
    }
}

/// Coordination event recorded by the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwarmEvent {
    /// Agent joined the collective
    AgentJoined {
        agent_id: AgentId,
        role: AgentRole,
        timestamp: DateTime<Utc>,
    },
    /// Task was routed to an agent
    TaskRouted {
        task_type: String,
        agent_id: AgentId,
        timestamp: DateTime<Utc>,
    },
    /// No idle agent could take a task
    TaskUnroutable {
        task_type: String,
        timestamp: DateTime<Utc>,
    },
    /// A consensus round finished
    CandidateDecided {
        candidate_id: CandidateId,
        accepted: bool,
        approval_ratio: f64,
        timestamp: DateTime<Utc>,
    },
    /// A new strategy generation was committed
    StrategyImproved {
        task_type: String,
        previous: String,
        current: String,
        generation: u32,
        timestamp: DateTime<Utc>,
    },
    /// Settlement of an accepted candidate completed
    Settled {
        candidate_id: CandidateId,
        success: bool,
        reference: String,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_round_trips_as_plain_string() {
        let id = AgentId::from("scout-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"scout-1\"");
        assert_eq!(id.to_string(), "scout-1");
    }

    #[test]
    fn test_candidate_builder() {
        let candidate = Candidate::new("c1", "Open dataset", "A dataset")
            .with_url("https://github.com/org/repo")
            .with_prior_score(80.0);
        assert_eq!(candidate.url.as_deref(), Some("https://github.com/org/repo"));
        assert_eq!(candidate.prior_score, 80.0);
    }

    #[test]
    fn test_custom_role_display() {
        assert_eq!(AgentRole::Custom("auditor".into()).to_string(), "auditor");
        assert_eq!(AgentRole::Scout.to_string(), "scout");
    }
}
