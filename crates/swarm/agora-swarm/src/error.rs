//! Error types for swarm coordination

use crate::types::AgentId;
use thiserror::Error;

/// Result type for swarm operations
pub type SwarmResult<T> = std::result::Result<T, SwarmError>;

/// Errors surfaced to callers of the swarm core.
///
/// Transient conditions that callers are expected to retry (no idle agent,
/// verifier abstention, advisor failure) are not errors; they travel as typed
/// results instead.
#[derive(Debug, Error)]
pub enum SwarmError {
    /// Agent not registered
    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    /// Agent id already registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    /// Strategy id not present in the store
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Stake weights must be strictly positive and finite
    #[error("Invalid stake {stake} for verifier {verifier}")]
    InvalidStake {
        verifier: String,
        stake: f64,
    },

    /// Invalid settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Settlement requested for a rejected candidate
    #[error("Candidate {0} was not accepted by consensus")]
    NotAccepted(String),

    /// Settlement collaborator failed
    #[error("Settlement failed: {0}")]
    Settlement(#[from] crate::settlement::SettlementError),

    /// Candidate source failed
    #[error("Candidate source failed: {0}")]
    Source(#[from] crate::source::SourceError),

    /// Shared core error (configuration loading and the like)
    #[error(transparent)]
    Core(#[from] agora_core::AgoraError),
}

impl From<SwarmError> for agora_core::AgoraError {
    fn from(err: SwarmError) -> Self {
        use agora_core::AgoraError;

        match err {
            SwarmError::UnknownAgent(_) | SwarmError::UnknownStrategy(_) => {
                AgoraError::not_found(err.to_string())
            }
            SwarmError::DuplicateAgent(_) => AgoraError::conflict(err.to_string()),
            SwarmError::InvalidStake { .. } | SwarmError::NotAccepted(_) => {
                AgoraError::invalid_input(err.to_string())
            }
            SwarmError::InvalidConfiguration(msg) => AgoraError::Configuration(msg),
            SwarmError::Settlement(_) | SwarmError::Source(_) => AgoraError::external(err.to_string()),
            SwarmError::Core(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::AgoraError;

    #[test]
    fn test_misuse_maps_to_client_errors() {
        let unknown: AgoraError = SwarmError::UnknownAgent(AgentId::from("scout-9")).into();
        assert!(matches!(unknown, AgoraError::NotFound(_)));
        assert!(unknown.is_client_error());

        let duplicate: AgoraError = SwarmError::DuplicateAgent(AgentId::from("scout-1")).into();
        assert!(matches!(duplicate, AgoraError::Conflict(_)));
    }

    #[test]
    fn test_core_errors_pass_through() {
        let original = AgoraError::config("missing file");
        let back: AgoraError = SwarmError::from(original.clone()).into();
        assert_eq!(back, original);
    }
}
