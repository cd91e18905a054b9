//! # Agora Swarm
//!
//! Coordination core for a small collective of task agents: message routing,
//! stake-weighted consensus over candidate results and self-improving task
//! strategies.
//!
//! ## Key Features
//!
//! - **Agent Registry**: roles, capabilities and Idle/Busy/Active status
//! - **Message Routing**: per-agent priority queues and atomic task hand-off
//! - **Stake-Weighted Consensus**: concurrent verifiers, abstention on failure
//! - **Strategy Evolution**: rolling performance and advisor-driven revisions
//! - **Settlement**: accepted candidates handed to an external backend
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             Swarm Coordinator            │
//! ├──────────────┬─────────────┬─────────────┤
//! │   Message    │  Consensus  │  Strategy   │
//! │   Router     │  Engine     │  Store      │
//! ├──────────────┼─────────────┼─────────────┤
//! │   Agent      │  Verifier   │ Improvement │
//! │   Registry   │  Pool       │ Loop        │
//! └──────────────┴─────────────┴─────────────┘
//!        │              │             │
//!    Candidate        Stake        Advisor,
//!    Source           Source       Settlement
//! ```

pub mod advisor;
pub mod consensus;
pub mod coordinator;
pub mod error;
pub mod improvement;
pub mod monitoring;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod settings;
pub mod settlement;
pub mod source;
pub mod stake;
pub mod strategy;
pub mod types;
pub mod verification;

pub use advisor::{
    parse_revision, Advisor, AdvisorError, CompletionAdvisor, CompletionClient, StrategyRevision,
    StrategySummary,
};
pub use consensus::{
    Abstention, BatchMode, ConsensusConfig, ConsensusEngine, ConsensusResult, Decision, VerifierPool, Vote,
};
pub use coordinator::SwarmCoordinator;
pub use error::{SwarmError, SwarmResult};
pub use improvement::{ImprovementConfig, ImprovementLoop};
pub use monitoring::{FlowEdge, HubStats, ImprovementStats};
pub use protocol::{Message, MessageKind, MessagePayload, Priority, TaskRequest, DEFAULT_PRIORITY, TASK_PRIORITY};
pub use registry::AgentRegistry;
pub use router::{MessageRouter, RouterConfig, TaskRoute};
pub use settings::{SettlementSettings, StakeSettings, SwarmSettings, ENV_PREFIX};
pub use settlement::{InMemorySettlement, LedgerEntry, Settlement, SettlementError, SettlementReceipt};
pub use source::{CandidateSource, SourceError, StaticSource};
pub use stake::{FixedStake, RandomStake, Stake, StakeSource};
pub use strategy::{Performance, Strategy, StrategyConfig, StrategyId, StrategyParameters, StrategyStore};
pub use types::*;
#[cfg(feature = "http")]
pub use verification::HttpLinkProbe;
pub use verification::{
    HeuristicConfig, HeuristicVerifier, Judgement, LinkProbe, StaticLinkProbe, Verifier, VerifierError,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AgentId, AgentRegistry, AgentRole, AgentStatus, Advisor, BatchMode, Candidate, CandidateSource,
        ConsensusEngine, ConsensusResult, Decision, MessageKind, MessagePayload, MessageRouter, Settlement,
        StakeSource, Strategy, StrategyParameters, StrategyStore, SwarmCoordinator, SwarmError, SwarmResult,
        SwarmSettings, TaskRoute, Verifier, VerifierPool,
    };
}
