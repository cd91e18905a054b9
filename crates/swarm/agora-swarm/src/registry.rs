//! Registry of known agents and their inbound queues.
//!
//! Agents and their queues share one lock so that the router can change an
//! agent's status and enqueue its task as a single step.

use crate::{
    error::{SwarmError, SwarmResult},
    protocol::{Message, Queued},
    types::{AgentId, AgentInfo, AgentRole, AgentStatus},
};
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use tracing::{debug, info};

pub(crate) struct AgentRecord {
    pub(crate) id: AgentId,
    pub(crate) role: AgentRole,
    pub(crate) status: AgentStatus,
    pub(crate) capabilities: BTreeSet<String>,
    pub(crate) queue: BinaryHeap<Queued>,
    pub(crate) registered_at: DateTime<Utc>,
    /// Registration order, used to break load ties
    pub(crate) order: u64,
}

impl AgentRecord {
    pub(crate) fn info(&self) -> AgentInfo {
        AgentInfo {
            id: self.id.clone(),
            role: self.role.clone(),
            status: self.status,
            capabilities: self.capabilities.clone(),
            queue_depth: self.queue.len(),
            registered_at: self.registered_at,
        }
    }

    pub(crate) fn enqueue(&mut self, message: Message) {
        self.queue.push(Queued(message));
    }
}

#[derive(Default)]
pub(crate) struct RegistryState {
    agents: HashMap<AgentId, AgentRecord>,
    next_order: u64,
}

impl RegistryState {
    pub(crate) fn get(&self, id: &AgentId) -> Option<&AgentRecord> {
        self.agents.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &AgentId) -> Option<&mut AgentRecord> {
        self.agents.get_mut(id)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &AgentRecord> {
        self.agents.values()
    }

    /// Agents serving `capability` in `status`, least loaded first
    pub(crate) fn candidates(&self, capability: &str, status: AgentStatus) -> Vec<&AgentRecord> {
        let mut matches: Vec<&AgentRecord> = self
            .agents
            .values()
            .filter(|record| record.status == status && record.capabilities.contains(capability))
            .collect();
        matches.sort_by_key(|record| (record.queue.len(), record.order));
        matches
    }
}

/// Set of known agents
#[derive(Default)]
pub struct AgentRegistry {
    state: RwLock<RegistryState>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new agent in the Idle state
    pub fn register<I, S>(&self, id: AgentId, role: AgentRole, capabilities: I) -> SwarmResult<AgentInfo>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        if state.agents.contains_key(&id) {
            return Err(SwarmError::DuplicateAgent(id));
        }

        let order = state.next_order;
        state.next_order += 1;

        let record = AgentRecord {
            id: id.clone(),
            role,
            status: AgentStatus::Idle,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            queue: BinaryHeap::new(),
            registered_at: Utc::now(),
            order,
        };
        let info = record.info();
        state.agents.insert(id, record);

        info!(agent = %info.id, role = %info.role, "agent registered");
        Ok(info)
    }

    /// Set an agent's status. Any status may follow any other.
    pub fn update_status(&self, id: &AgentId, status: AgentStatus) -> SwarmResult<()> {
        let mut state = self.state.write();
        let record = state
            .get_mut(id)
            .ok_or_else(|| SwarmError::UnknownAgent(id.clone()))?;

        debug!(agent = %id, from = ?record.status, to = ?status, "agent status updated");
        record.status = status;
        Ok(())
    }

    /// Agents serving `capability` with `status`, ordered by ascending queue
    /// depth and then registration order
    pub fn find(&self, capability: &str, status: AgentStatus) -> Vec<AgentInfo> {
        self.state
            .read()
            .candidates(capability, status)
            .into_iter()
            .map(AgentRecord::info)
            .collect()
    }

    /// Idle agents serving `capability`
    pub fn find_idle(&self, capability: &str) -> Vec<AgentInfo> {
        self.find(capability, AgentStatus::Idle)
    }

    /// Snapshot of one agent
    pub fn get(&self, id: &AgentId) -> Option<AgentInfo> {
        self.state.read().get(id).map(AgentRecord::info)
    }

    /// Snapshot of every agent in registration order
    pub fn agents(&self) -> Vec<AgentInfo> {
        let state = self.state.read();
        let mut records: Vec<&AgentRecord> = state.records().collect();
        records.sort_by_key(|record| record.order);
        records.into_iter().map(AgentRecord::info).collect()
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.state.read().agents.len()
    }

    /// Check whether no agent is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(agents: &[(&str, AgentRole, &[&str])]) -> AgentRegistry {
        let registry = AgentRegistry::new();
        for (id, role, caps) in agents {
            registry
                .register(AgentId::from(*id), role.clone(), caps.iter().copied())
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = registry_with(&[("scout-1", AgentRole::Scout, &["discover"])]);
        let err = registry
            .register(AgentId::from("scout-1"), AgentRole::Verifier, ["verify"])
            .unwrap_err();
        assert!(matches!(err, SwarmError::DuplicateAgent(id) if id.as_str() == "scout-1"));

        let info = registry.get(&AgentId::from("scout-1")).unwrap();
        assert_eq!(info.role, AgentRole::Scout);
        assert_eq!(info.status, AgentStatus::Idle);
    }

    #[test]
    fn test_update_status_unknown_agent() {
        let registry = AgentRegistry::new();
        let err = registry
            .update_status(&AgentId::from("ghost"), AgentStatus::Busy)
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownAgent(_)));
    }

    #[test]
    fn test_any_status_transition_is_allowed() {
        let registry = registry_with(&[("exec-1", AgentRole::Executor, &["execute"])]);
        let id = AgentId::from("exec-1");

        for status in [
            AgentStatus::Idle,
            AgentStatus::Idle,
            AgentStatus::Busy,
            AgentStatus::Idle,
            AgentStatus::Active,
            AgentStatus::Busy,
        ] {
            registry.update_status(&id, status).unwrap();
            assert_eq!(registry.get(&id).unwrap().status, status);
        }
    }

    #[test]
    fn test_update_then_find_returns_agent_once() {
        let registry = registry_with(&[
            ("v-1", AgentRole::Verifier, &["verify"]),
            ("v-2", AgentRole::Verifier, &["verify", "discover"]),
        ]);

        for status in [AgentStatus::Idle, AgentStatus::Busy, AgentStatus::Active] {
            registry.update_status(&AgentId::from("v-2"), status).unwrap();
            let found = registry.find("discover", status);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id.as_str(), "v-2");
        }
    }

    #[test]
    fn test_find_filters_capability_and_status() {
        let registry = registry_with(&[
            ("v-1", AgentRole::Verifier, &["verify"]),
            ("s-1", AgentRole::Scout, &["discover"]),
            ("v-2", AgentRole::Verifier, &["verify"]),
        ]);
        registry.update_status(&AgentId::from("v-1"), AgentStatus::Busy).unwrap();

        let idle: Vec<String> = registry
            .find_idle("verify")
            .into_iter()
            .map(|a| a.id.to_string())
            .collect();
        assert_eq!(idle, vec!["v-2"]);
        assert!(registry.find_idle("execute").is_empty());
    }

    #[test]
    fn test_find_ties_break_by_registration_order() {
        let registry = registry_with(&[
            ("b", AgentRole::Verifier, &["verify"]),
            ("a", AgentRole::Verifier, &["verify"]),
            ("c", AgentRole::Verifier, &["verify"]),
        ]);

        let ids: Vec<String> = registry.find_idle("verify").into_iter().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let all: Vec<String> = registry.agents().into_iter().map(|a| a.id.to_string()).collect();
        assert_eq!(all, vec!["b", "a", "c"]);
        assert_eq!(registry.len(), 3);
    }
}
