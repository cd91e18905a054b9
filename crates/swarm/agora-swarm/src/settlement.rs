//! Settlement of accepted candidates.

use crate::{consensus::ConsensusResult, types::CandidateId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Outcome reported by a settlement backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub success: bool,
    /// Backend reference such as a transaction hash
    pub reference: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("Settlement backend unavailable: {0}")]
    Unavailable(String),

    #[error("Settlement rejected: {0}")]
    Rejected(String),

    #[error("Settlement timed out after {0}ms")]
    Timeout(u64),
}

/// Acts on an accepted consensus result
#[async_trait]
pub trait Settlement: Send + Sync {
    async fn settle(&self, result: &ConsensusResult, amount: u64) -> Result<SettlementReceipt, SettlementError>;
}

/// Entry in an [`InMemorySettlement`] ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub candidate_id: CandidateId,
    pub amount: u64,
    pub reference: String,
    pub settled_at: DateTime<Utc>,
}

/// Settlement backend keeping a local ledger
#[derive(Debug, Default)]
pub struct InMemorySettlement {
    ledger: Mutex<Vec<LedgerEntry>>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.ledger.lock().clone()
    }
}

#[async_trait]
impl Settlement for InMemorySettlement {
    async fn settle(&self, result: &ConsensusResult, amount: u64) -> Result<SettlementReceipt, SettlementError> {
        if amount == 0 {
            return Err(SettlementError::Rejected("amount must be positive".to_string()));
        }

        let reference = format!("0x{}", Uuid::new_v4().simple());
        self.ledger.lock().push(LedgerEntry {
            candidate_id: result.candidate_id.clone(),
            amount,
            reference: reference.clone(),
            settled_at: Utc::now(),
        });

        Ok(SettlementReceipt {
            success: true,
            reference,
        })
    }
}
