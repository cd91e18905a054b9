//! Voting weight of verifiers.
//!
//! Stakes are fetched once when a pool is assembled and fixed for the life of
//! the pool. Where the weight comes from is an external concern.

use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::ops::Range;
use tracing::warn;

/// Positive voting weight
pub type Stake = f64;

/// Provides the stake of a verifier
#[async_trait]
pub trait StakeSource: Send + Sync {
    /// Stake of the named verifier
    async fn stake_of(&self, verifier: &str) -> Stake;
}

/// Stake drawn uniformly from a range, standing in for an on-chain balance
#[derive(Debug, Clone)]
pub struct RandomStake {
    range: Range<f64>,
}

impl RandomStake {
    /// Draw stakes from `range`.
    ///
    /// A range with a non-finite bound or width falls back to the default
    /// range.
    pub fn new(range: Range<f64>) -> Self {
        if !(range.end - range.start).is_finite() {
            warn!(start = range.start, end = range.end, "non-finite stake range, using default");
            return Self::default();
        }
        Self { range }
    }
}

impl Default for RandomStake {
    fn default() -> Self {
        Self {
            range: 1000.0..5000.0,
        }
    }
}

#[async_trait]
impl StakeSource for RandomStake {
    async fn stake_of(&self, _verifier: &str) -> Stake {
        if self.range.is_empty() {
            return self.range.start;
        }
        rand::thread_rng().gen_range(self.range.clone())
    }
}

/// Fixed per-verifier stakes with a fallback
#[derive(Debug, Clone, Default)]
pub struct FixedStake {
    stakes: HashMap<String, Stake>,
    fallback: Stake,
}

impl FixedStake {
    /// Every verifier gets `stake`
    pub fn uniform(stake: Stake) -> Self {
        Self {
            stakes: HashMap::new(),
            fallback: stake,
        }
    }

    /// Assign a specific stake to one verifier
    pub fn with(mut self, verifier: impl Into<String>, stake: Stake) -> Self {
        self.stakes.insert(verifier.into(), stake);
        self
    }
}

#[async_trait]
impl StakeSource for FixedStake {
    async fn stake_of(&self, verifier: &str) -> Stake {
        self.stakes.get(verifier).copied().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_stake_stays_in_range() {
        let source = RandomStake::default();
        for i in 0..100 {
            let stake = source.stake_of(&format!("v-{i}")).await;
            assert!((1000.0..5000.0).contains(&stake));
        }
    }

    #[tokio::test]
    async fn test_non_finite_range_falls_back_to_default() {
        for range in [1.0..f64::INFINITY, f64::NEG_INFINITY..1.0, f64::NAN..10.0, -f64::MAX..f64::MAX] {
            let source = RandomStake::new(range);
            let stake = source.stake_of("v-1").await;
            assert!((1000.0..5000.0).contains(&stake));
        }
    }

    #[tokio::test]
    async fn test_empty_range_yields_start() {
        let source = RandomStake::new(2000.0..2000.0);
        assert_eq!(source.stake_of("v-1").await, 2000.0);
    }

    #[tokio::test]
    async fn test_fixed_stake_fallback() {
        let source = FixedStake::uniform(1000.0).with("v-2", 1200.0);
        assert_eq!(source.stake_of("v-1").await, 1000.0);
        assert_eq!(source.stake_of("v-2").await, 1200.0);
    }
}
