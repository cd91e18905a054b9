//! Stake-weighted consensus over a pool of verifiers.
//!
//! Every verifier in the pool judges the candidate concurrently. A verifier
//! that fails or exceeds its timeout abstains: its stake leaves the tally
//! and it contributes zero to the average confidence. The candidate is
//! accepted when the approving share of participating stake reaches the
//! threshold.

use crate::{
    error::{SwarmError, SwarmResult},
    monitoring,
    stake::{Stake, StakeSource},
    types::{Candidate, CandidateId},
    verification::{Verifier, MAX_CONFIDENCE},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Consensus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Required approving share of participating stake, in (0, 1]
    pub threshold: f64,
    /// Time each verifier gets before it is counted as abstaining
    pub verifier_timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            verifier_timeout_ms: 10_000,
        }
    }
}

impl ConsensusConfig {
    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_millis(self.verifier_timeout_ms)
    }

    pub(crate) fn check(&self) -> SwarmResult<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SwarmError::InvalidConfiguration(format!(
                "consensus threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.verifier_timeout_ms == 0 {
            return Err(SwarmError::InvalidConfiguration(
                "verifier timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a consensus round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Rejected,
}

impl Decision {
    pub fn is_accepted(self) -> bool {
        matches!(self, Decision::Accepted)
    }
}

/// Vote cast by a verifier that answered in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: String,
    pub accept: bool,
    /// Always positive
    pub stake: Stake,
    /// 0..=100
    pub confidence: f64,
    pub rationale: String,
}

/// Verifier that failed to answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Abstention {
    pub voter: String,
    pub stake: Stake,
    pub reason: String,
}

/// Result of one consensus round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub candidate_id: CandidateId,
    pub decision: Decision,
    pub approval_stake: Stake,
    /// Stake of the verifiers that voted
    pub total_stake: Stake,
    /// `approval_stake / total_stake`, 0 when nobody voted
    pub approval_ratio: f64,
    /// Mean confidence over the whole pool, abstentions counted as 0
    pub avg_confidence: f64,
    pub votes: Vec<Vote>,
    pub abstentions: Vec<Abstention>,
    pub threshold: f64,
    pub rationale: String,
    pub decided_at: DateTime<Utc>,
}

impl ConsensusResult {
    /// Tally votes and abstentions against `threshold`
    pub fn tally(
        candidate_id: impl Into<CandidateId>,
        votes: Vec<Vote>,
        abstentions: Vec<Abstention>,
        threshold: f64,
    ) -> Self {
        let total_stake: Stake = votes.iter().map(|v| v.stake).sum();
        let approval_stake: Stake = votes.iter().filter(|v| v.accept).map(|v| v.stake).sum();

        let approval_ratio = if total_stake > 0.0 {
            (approval_stake / total_stake).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let pool_size = votes.len() + abstentions.len();
        let avg_confidence = if pool_size == 0 {
            0.0
        } else {
            votes.iter().map(|v| v.confidence).sum::<f64>() / pool_size as f64
        };

        let decision = if total_stake > 0.0 && approval_ratio >= threshold {
            Decision::Accepted
        } else {
            Decision::Rejected
        };

        let rationale = format!(
            "{:.0}% stake-weighted approval (threshold: {:.0}%)",
            approval_ratio * 100.0,
            threshold * 100.0
        );

        Self {
            candidate_id: candidate_id.into(),
            decision,
            approval_stake,
            total_stake,
            approval_ratio,
            avg_confidence,
            votes,
            abstentions,
            threshold,
            rationale,
            decided_at: Utc::now(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }
}

/// How `verify_batch` schedules its rounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// One round after another
    #[default]
    Sequential,
    /// All rounds at once
    Parallel,
}

struct PoolMember {
    verifier: Arc<dyn Verifier>,
    stake: Stake,
}

/// Fixed set of verifiers with their stakes
pub struct VerifierPool {
    members: Vec<PoolMember>,
}

impl VerifierPool {
    /// Build a pool with explicit stakes
    pub fn with_stakes<I>(members: I) -> SwarmResult<Self>
    where
        I: IntoIterator<Item = (Arc<dyn Verifier>, Stake)>,
    {
        let members = members
            .into_iter()
            .map(|(verifier, stake)| {
                if stake.is_finite() && stake > 0.0 {
                    Ok(PoolMember { verifier, stake })
                } else {
                    Err(SwarmError::InvalidStake {
                        verifier: verifier.name().to_string(),
                        stake,
                    })
                }
            })
            .collect::<SwarmResult<Vec<_>>>()?;

        Ok(Self { members })
    }

    /// Build a pool, asking `stakes` for each verifier's weight once
    pub async fn assemble(verifiers: Vec<Arc<dyn Verifier>>, stakes: &dyn StakeSource) -> SwarmResult<Self> {
        let mut weighted = Vec::with_capacity(verifiers.len());
        for verifier in verifiers {
            let stake = stakes.stake_of(verifier.name()).await;
            debug!(verifier = verifier.name(), stake, "verifier stake assigned");
            weighted.push((verifier, stake));
        }
        Self::with_stakes(weighted)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Verifier names and stakes
    pub fn stakes(&self) -> Vec<(String, Stake)> {
        self.members
            .iter()
            .map(|m| (m.verifier.name().to_string(), m.stake))
            .collect()
    }

    pub fn total_stake(&self) -> Stake {
        self.members.iter().map(|m| m.stake).sum()
    }
}

enum Ballot {
    Vote(Vote),
    Abstain(Abstention),
}

/// Runs consensus rounds over a verifier pool
pub struct ConsensusEngine {
    pool: VerifierPool,
    config: ConsensusConfig,
}

impl ConsensusEngine {
    /// Create an engine; fails on a threshold outside (0, 1]
    pub fn new(pool: VerifierPool, config: ConsensusConfig) -> SwarmResult<Self> {
        config.check()?;
        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &VerifierPool {
        &self.pool
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Run one consensus round. Never fails; verifier problems become
    /// abstentions.
    pub async fn decide(&self, candidate: &Candidate) -> ConsensusResult {
        let started = Instant::now();
        let limit = self.config.verifier_timeout();

        let ballots = join_all(
            self.pool
                .members
                .iter()
                .map(|member| Self::ballot(member, candidate, limit)),
        )
        .await;

        let mut votes = Vec::new();
        let mut abstentions = Vec::new();
        for ballot in ballots {
            match ballot {
                Ballot::Vote(vote) => votes.push(vote),
                Ballot::Abstain(abstention) => abstentions.push(abstention),
            }
        }

        let result = ConsensusResult::tally(candidate.id.clone(), votes, abstentions, self.config.threshold);

        monitoring::record_round(result.decision, result.abstentions.len(), started.elapsed());
        info!(
            candidate = %result.candidate_id,
            decision = ?result.decision,
            approval_ratio = result.approval_ratio,
            abstentions = result.abstentions.len(),
            "consensus reached"
        );

        result
    }

    /// Decide every candidate; later duplicates of an id replace earlier ones
    pub async fn verify_batch(
        &self,
        candidates: &[Candidate],
        mode: BatchMode,
    ) -> HashMap<CandidateId, ConsensusResult> {
        let results = match mode {
            BatchMode::Sequential => {
                let mut results = Vec::with_capacity(candidates.len());
                for candidate in candidates {
                    results.push(self.decide(candidate).await);
                }
                results
            }
            BatchMode::Parallel => join_all(candidates.iter().map(|c| self.decide(c))).await,
        };

        results
            .into_iter()
            .map(|result| (result.candidate_id.clone(), result))
            .collect()
    }

    async fn ballot(member: &PoolMember, candidate: &Candidate, limit: Duration) -> Ballot {
        let voter = member.verifier.name().to_string();

        // A panicking verifier abstains like a failing one
        let judged = AssertUnwindSafe(timeout(limit, member.verifier.judge(candidate)))
            .catch_unwind()
            .await
            .map_err(|_| "verifier panicked".to_string());

        let reason = match judged {
            Ok(Ok(Ok(judgement))) if judgement.confidence.is_finite() => {
                return Ballot::Vote(Vote {
                    voter,
                    accept: judgement.accept,
                    stake: member.stake,
                    confidence: judgement.confidence.clamp(0.0, MAX_CONFIDENCE),
                    rationale: judgement.rationale,
                });
            }
            Ok(Ok(Ok(_))) => "non-finite confidence".to_string(),
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(_)) => format!("timed out after {}ms", limit.as_millis()),
            Err(reason) => reason,
        };

        warn!(verifier = %voter, candidate = %candidate.id, %reason, "verifier abstained");
        Ballot::Abstain(Abstention {
            voter,
            stake: member.stake,
            reason,
        })
    }
}
