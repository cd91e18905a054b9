//! Where candidates come from.

use crate::types::Candidate;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Candidate source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid candidate data: {0}")]
    InvalidData(String),
}

/// Produces candidates for verification
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Fetch at most `limit` candidates
    async fn fetch(&self, limit: usize) -> Result<Vec<Candidate>, SourceError>;
}

/// Source serving a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<Candidate>,
}

impl StaticSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_honours_limit() {
        let source = StaticSource::new(vec![
            Candidate::new("c1", "one", "first"),
            Candidate::new("c2", "two", "second"),
        ]);
        assert_eq!(source.fetch(1).await.unwrap().len(), 1);
        assert_eq!(source.fetch(10).await.unwrap().len(), 2);
    }
}
