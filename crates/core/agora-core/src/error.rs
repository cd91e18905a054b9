//! Error handling types shared by every Agora crate.
//!
//! Crate-specific error enums convert into [`AgoraError`] at their boundary so
//! callers embedding several components can handle failures uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The main error type for the Agora workspace.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgoraError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    Conflict(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Errors reported by an external collaborator
    #[error("External collaborator error: {0}")]
    External(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgoraError {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new invalid input error
    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Create a new not found error
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Create a new conflict error
    pub fn conflict<T: fmt::Display>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Create a new timeout error
    pub fn timeout<T: fmt::Display>(msg: T) -> Self {
        Self::Timeout(msg.to_string())
    }

    /// Create a new external collaborator error
    pub fn external<T: fmt::Display>(msg: T) -> Self {
        Self::External(msg.to_string())
    }

    /// Create a new serialization error
    pub fn serialization<T: fmt::Display>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a new internal error
    pub fn internal<T: fmt::Display>(msg: T) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Check if this error is worth retrying
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::External(_))
    }

    /// Check if this error was caused by caller misuse
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::NotFound(_) | Self::Conflict(_) | Self::Configuration(_)
        )
    }
}

/// Result type alias for Agora operations
pub type AgoraResult<T> = Result<T, AgoraError>;

impl From<std::io::Error> for AgoraError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AgoraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AgoraError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AgoraError::config("bad threshold");
        assert_eq!(err, AgoraError::Configuration("bad threshold".to_string()));
        assert_eq!(err.to_string(), "Configuration error: bad threshold");
    }

    #[test]
    fn test_error_classification() {
        let misuse = AgoraError::not_found("agent scout-1");
        assert!(misuse.is_client_error());
        assert!(!misuse.is_retryable());

        let slow = AgoraError::timeout("advisor");
        assert!(slow.is_retryable());
        assert!(!slow.is_client_error());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(AgoraError::from(io_err), AgoraError::Internal(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(AgoraError::from(json_err), AgoraError::Serialization(_)));
    }
}
