//! Messages exchanged between agents through the router

use crate::types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Message priority; higher values are delivered first
pub type Priority = u8;

/// Priority of ordinary messages
pub const DEFAULT_PRIORITY: Priority = 5;

/// Priority of task requests issued by `route_task`
pub const TASK_PRIORITY: Priority = 8;

/// Kind of message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Response,
    Broadcast,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Response => "RESPONSE",
            MessageKind::Broadcast => "BROADCAST",
        };
        f.write_str(name)
    }
}

/// Task handed to an agent by `route_task`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: Uuid,
    pub task_type: String,
    /// Task input, opaque to the router
    pub data: serde_json::Value,
}

/// Payload of a message.
///
/// The router never looks inside; `Task` is the only variant the core itself
/// produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Empty payload
    Empty,
    /// Text payload
    Text(String),
    /// Structured payload
    Json(serde_json::Value),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Routed task
    Task(TaskRequest),
}

/// Message queued for a single recipient.
///
/// Immutable once created. `sequence` is assigned by the router and orders
/// messages of equal priority by arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sequence: u64,
    pub from: AgentId,
    pub to: AgentId,
    pub kind: MessageKind,
    pub payload: MessagePayload,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(
        sequence: u64,
        from: AgentId,
        to: AgentId,
        kind: MessageKind,
        payload: MessagePayload,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            from,
            to,
            kind,
            payload,
            priority,
            timestamp: Utc::now(),
        }
    }

    /// Task carried by this message, if it is a routed task
    pub fn task(&self) -> Option<&TaskRequest> {
        match &self.payload {
            MessagePayload::Task(task) => Some(task),
            _ => None,
        }
    }
}

/// Heap entry: highest priority first, then lowest sequence
#[derive(Debug)]
pub(crate) struct Queued(pub(crate) Message);

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.sequence == other.0.sequence
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn message(sequence: u64, priority: Priority) -> Message {
        Message::new(
            sequence,
            AgentId::from("a"),
            AgentId::from("b"),
            MessageKind::Request,
            MessagePayload::Empty,
            priority,
        )
    }

    #[test]
    fn test_heap_orders_by_priority_then_arrival() {
        let mut heap = BinaryHeap::new();
        heap.push(Queued(message(1, DEFAULT_PRIORITY)));
        heap.push(Queued(message(2, TASK_PRIORITY)));
        heap.push(Queued(message(3, DEFAULT_PRIORITY)));
        heap.push(Queued(message(4, TASK_PRIORITY)));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|q| q.0.sequence)).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_task_accessor() {
        let mut msg = message(1, TASK_PRIORITY);
        assert!(msg.task().is_none());

        msg.payload = MessagePayload::Task(TaskRequest {
            task_id: Uuid::new_v4(),
            task_type: "verify".into(),
            data: serde_json::json!({"candidate": "c1"}),
        });
        assert_eq!(msg.task().map(|t| t.task_type.as_str()), Some("verify"));
    }
}
