//! Message routing between registered agents.
//!
//! Every accepted message lands in exactly one recipient queue and is also
//! appended to an append-only history used for statistics. Delivery is
//! poll-based: [`MessageRouter::next_message`] never waits.

use crate::{
    error::{SwarmError, SwarmResult},
    monitoring::{self, FlowEdge, HubStats},
    protocol::{Message, MessageKind, MessagePayload, Priority, TaskRequest, DEFAULT_PRIORITY, TASK_PRIORITY},
    registry::{AgentRegistry, RegistryState},
    types::{AgentId, AgentRole, AgentStatus, SYSTEM_SENDER},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Priority of broadcasts and of `send` calls that do not care
    pub default_priority: Priority,
    /// Priority of routed task requests
    pub task_priority: Priority,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            task_priority: TASK_PRIORITY,
        }
    }
}

/// Outcome of [`MessageRouter::route_task`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRoute {
    /// The agent was marked Busy and received the task request
    Routed {
        agent_id: AgentId,
        task_id: Uuid,
        message_id: Uuid,
    },
    /// No idle agent serves the task type; nothing was changed
    NoAvailableAgent { task_type: String },
}

impl TaskRoute {
    /// Agent that received the task, if any
    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            TaskRoute::Routed { agent_id, .. } => Some(agent_id),
            TaskRoute::NoAvailableAgent { .. } => None,
        }
    }
}

/// Queues and routes messages between agents
pub struct MessageRouter {
    registry: Arc<AgentRegistry>,
    config: RouterConfig,
    history: RwLock<Vec<Message>>,
    /// Next sequence number; only advanced under the registry write lock
    next_sequence: AtomicU64,
}

impl MessageRouter {
    /// Create a router over a registry
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self::with_config(registry, RouterConfig::default())
    }

    /// Create a router with explicit settings
    pub fn with_config(registry: Arc<AgentRegistry>, config: RouterConfig) -> Self {
        Self {
            registry,
            config,
            history: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Registry this router delivers into
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Send a message to a registered agent
    pub fn send(
        &self,
        from: AgentId,
        to: AgentId,
        kind: MessageKind,
        payload: MessagePayload,
        priority: Priority,
    ) -> SwarmResult<Uuid> {
        let mut state = self.registry.write();
        self.deliver(&mut state, from, to, kind, payload, priority)
    }

    /// Send one copy of `payload` to every agent with `role` except `from`.
    ///
    /// Returns how many copies were delivered; zero recipients is not an error.
    pub fn broadcast(&self, from: AgentId, role: &AgentRole, payload: MessagePayload) -> usize {
        let mut state = self.registry.write();
        let recipients: Vec<AgentId> = state
            .records()
            .filter(|record| &record.role == role && record.id != from)
            .map(|record| record.id.clone())
            .collect();

        let mut delivered = 0;
        for to in recipients {
            let sent = self.deliver(
                &mut state,
                from.clone(),
                to,
                MessageKind::Broadcast,
                payload.clone(),
                self.config.default_priority,
            );
            if sent.is_ok() {
                delivered += 1;
            }
        }

        debug!(from = %from, role = %role, delivered, "broadcast sent");
        delivered
    }

    /// Hand a task to the least-loaded idle agent serving `task_type`.
    ///
    /// Selection, the Busy transition and the enqueue happen under one
    /// registry lock, so no observer sees one without the other.
    pub fn route_task(&self, task_type: &str, data: serde_json::Value) -> TaskRoute {
        let mut state = self.registry.write();

        let selected = state
            .candidates(task_type, AgentStatus::Idle)
            .first()
            .map(|record| record.id.clone());
        let Some(agent_id) = selected else {
            drop(state);
            warn!(task_type, "no available agent for task");
            monitoring::record_route(task_type, false);
            return TaskRoute::NoAvailableAgent {
                task_type: task_type.to_string(),
            };
        };

        let task_id = Uuid::new_v4();
        let payload = MessagePayload::Task(TaskRequest {
            task_id,
            task_type: task_type.to_string(),
            data,
        });

        // The candidate was found under this same guard, so delivery cannot miss
        let delivered = self.deliver(
            &mut state,
            AgentId::from(SYSTEM_SENDER),
            agent_id.clone(),
            MessageKind::Request,
            payload,
            self.config.task_priority,
        );
        let (Ok(message_id), Some(record)) = (delivered, state.get_mut(&agent_id)) else {
            return TaskRoute::NoAvailableAgent {
                task_type: task_type.to_string(),
            };
        };
        record.status = AgentStatus::Busy;
        drop(state);

        info!(task_type, agent = %agent_id, %task_id, "task routed");
        monitoring::record_route(task_type, true);

        TaskRoute::Routed {
            agent_id,
            task_id,
            message_id,
        }
    }

    /// Pop the highest-priority, oldest message for an agent.
    ///
    /// Returns `None` for an empty queue or an unknown agent.
    pub fn next_message(&self, agent_id: &AgentId) -> Option<Message> {
        let mut state = self.registry.write();
        state
            .get_mut(agent_id)
            .and_then(|record| record.queue.pop())
            .map(|queued| queued.0)
    }

    /// Number of messages waiting for an agent
    pub fn pending(&self, agent_id: &AgentId) -> usize {
        self.registry
            .read()
            .get(agent_id)
            .map_or(0, |record| record.queue.len())
    }

    /// Snapshot of every message ever accepted, in acceptance order
    pub fn history(&self) -> Vec<Message> {
        self.history.read().clone()
    }

    /// Communication statistics
    pub fn stats(&self) -> HubStats {
        let (total_agents, active_agents) = {
            let state = self.registry.read();
            let total = state.records().count();
            let active = state
                .records()
                .filter(|record| matches!(record.status, AgentStatus::Active | AgentStatus::Busy))
                .count();
            (total, active)
        };

        let history = self.history.read();
        let mut messages_per_sender = BTreeMap::new();
        for message in history.iter() {
            *messages_per_sender.entry(message.from.clone()).or_insert(0) += 1;
        }

        HubStats {
            total_agents,
            active_agents,
            total_messages: history.len(),
            messages_per_sender,
        }
    }

    /// Message counts per (sender, recipient) pair
    pub fn message_flow(&self) -> Vec<FlowEdge> {
        let mut flow: BTreeMap<(AgentId, AgentId), usize> = BTreeMap::new();
        for message in self.history.read().iter() {
            *flow.entry((message.from.clone(), message.to.clone())).or_insert(0) += 1;
        }

        flow.into_iter()
            .map(|((from, to), count)| FlowEdge { from, to, count })
            .collect()
    }

    fn deliver(
        &self,
        state: &mut RegistryState,
        from: AgentId,
        to: AgentId,
        kind: MessageKind,
        payload: MessagePayload,
        priority: Priority,
    ) -> SwarmResult<Uuid> {
        let Some(record) = state.get_mut(&to) else {
            warn!(from = %from, to = %to, "message to unknown agent dropped");
            return Err(SwarmError::UnknownAgent(to));
        };

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);

        let message = Message::new(sequence, from, to, kind, payload, priority);
        let id = message.id;

        self.history.write().push(message.clone());
        record.enqueue(message);

        debug!(%id, kind = %kind, priority, "message queued");
        monitoring::record_message(kind);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> MessageRouter {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(AgentId::from("scout-1"), AgentRole::Scout, ["discover"]).unwrap();
        registry.register(AgentId::from("v-1"), AgentRole::Verifier, ["verify"]).unwrap();
        registry.register(AgentId::from("v-2"), AgentRole::Verifier, ["verify"]).unwrap();
        MessageRouter::new(registry)
    }

    fn text(s: &str) -> MessagePayload {
        MessagePayload::Text(s.to_string())
    }

    #[test]
    fn test_send_to_unknown_agent_fails_without_history() {
        let router = router();
        let err = router
            .send(
                AgentId::from("scout-1"),
                AgentId::from("ghost"),
                MessageKind::Request,
                text("hi"),
                DEFAULT_PRIORITY,
            )
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownAgent(_)));
        assert!(router.history().is_empty());
    }

    #[test]
    fn test_next_message_priority_then_fifo() {
        let router = router();
        let to = AgentId::from("v-1");
        let from = AgentId::from("scout-1");

        for (body, priority) in [("low-a", 1), ("high-a", 9), ("low-b", 1), ("high-b", 9), ("mid", 5)] {
            router
                .send(from.clone(), to.clone(), MessageKind::Request, text(body), priority)
                .unwrap();
        }

        let order: Vec<MessagePayload> = std::iter::from_fn(|| router.next_message(&to))
            .map(|m| m.payload)
            .collect();
        assert_eq!(
            order,
            vec![text("high-a"), text("high-b"), text("mid"), text("low-a"), text("low-b")]
        );
        assert!(router.next_message(&to).is_none());
        assert_eq!(router.history().len(), 5);
    }

    #[test]
    fn test_next_message_unknown_agent_is_none() {
        assert!(router().next_message(&AgentId::from("ghost")).is_none());
    }

    #[test]
    fn test_broadcast_skips_sender_and_other_roles() {
        let router = router();
        let delivered = router.broadcast(AgentId::from("v-1"), &AgentRole::Verifier, text("sync"));
        assert_eq!(delivered, 1);
        assert_eq!(router.pending(&AgentId::from("v-2")), 1);
        assert_eq!(router.pending(&AgentId::from("v-1")), 0);
        assert_eq!(router.pending(&AgentId::from("scout-1")), 0);

        let msg = router.next_message(&AgentId::from("v-2")).unwrap();
        assert_eq!(msg.kind, MessageKind::Broadcast);
    }

    #[test]
    fn test_broadcast_without_recipients_is_zero() {
        let router = router();
        assert_eq!(router.broadcast(AgentId::from("system"), &AgentRole::Executor, text("go")), 0);
        assert!(router.history().is_empty());
    }

    #[test]
    fn test_route_task_prefers_least_loaded_and_marks_busy() {
        let router = router();
        router
            .send(
                AgentId::from("scout-1"),
                AgentId::from("v-1"),
                MessageKind::Request,
                text("backlog"),
                DEFAULT_PRIORITY,
            )
            .unwrap();

        let route = router.route_task("verify", serde_json::json!({"candidate": "c1"}));
        assert_eq!(route.agent_id().map(AgentId::as_str), Some("v-2"));

        let v2 = router.registry().get(&AgentId::from("v-2")).unwrap();
        assert_eq!(v2.status, AgentStatus::Busy);
        assert_eq!(v2.queue_depth, 1);

        let task = router.next_message(&AgentId::from("v-2")).unwrap();
        assert_eq!(task.priority, TASK_PRIORITY);
        assert_eq!(task.from.as_str(), SYSTEM_SENDER);
        assert_eq!(task.task().unwrap().task_type, "verify");
    }

    #[test]
    fn test_route_task_without_idle_agent_changes_nothing() {
        let router = router();
        for id in ["v-1", "v-2"] {
            router.registry().update_status(&AgentId::from(id), AgentStatus::Busy).unwrap();
        }

        let route = router.route_task("verify", serde_json::Value::Null);
        assert_eq!(
            route,
            TaskRoute::NoAvailableAgent {
                task_type: "verify".to_string()
            }
        );
        assert!(router.history().is_empty());
        for id in ["v-1", "v-2"] {
            let info = router.registry().get(&AgentId::from(id)).unwrap();
            assert_eq!(info.status, AgentStatus::Busy);
            assert_eq!(info.queue_depth, 0);
        }
    }

    #[test]
    fn test_stats_and_flow() {
        let router = router();
        let scout = AgentId::from("scout-1");
        let v1 = AgentId::from("v-1");
        router.send(scout.clone(), v1.clone(), MessageKind::Request, text("a"), 5).unwrap();
        router.send(scout.clone(), v1.clone(), MessageKind::Request, text("b"), 5).unwrap();
        router.send(v1.clone(), scout.clone(), MessageKind::Response, text("c"), 5).unwrap();
        router.registry().update_status(&v1, AgentStatus::Active).unwrap();

        let stats = router.stats();
        assert_eq!(stats.total_agents, 3);
        assert_eq!(stats.active_agents, 1);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.messages_per_sender[&scout], 2);
        assert_eq!(stats.messages_per_sender[&v1], 1);

        let flow = router.message_flow();
        assert!(flow.contains(&FlowEdge { from: scout.clone(), to: v1.clone(), count: 2 }));
        assert!(flow.contains(&FlowEdge { from: v1, to: scout, count: 1 }));
    }
}
