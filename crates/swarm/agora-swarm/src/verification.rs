//! Candidate verifiers.
//!
//! A verifier judges one candidate and reports an accept flag, a confidence
//! on a 0..=100 scale and a rationale. Errors are not fatal: the consensus
//! engine counts a failed verifier as an abstention.

use crate::types::Candidate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Points for a reachable source link
pub const REACHABLE_LINK_POINTS: f64 = 30.0;
/// Points for a description longer than [`MIN_DESCRIPTION_CHARS`]
pub const DESCRIPTION_POINTS: f64 = 20.0;
/// Points for a title of reasonable length
pub const TITLE_POINTS: f64 = 15.0;
/// Points for an upstream score above [`PRIOR_SCORE_FLOOR`]
pub const PRIOR_SCORE_POINTS: f64 = 20.0;
/// Points for a link on a trusted domain
pub const TRUSTED_DOMAIN_POINTS: f64 = 15.0;

pub const MIN_DESCRIPTION_CHARS: usize = 50;
pub const PRIOR_SCORE_FLOOR: f64 = 70.0;
/// Maximum confidence any verifier may report
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Verdict of a single verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub accept: bool,
    /// 0..=100
    pub confidence: f64,
    pub rationale: String,
}

/// Failure of a verifier; treated as an abstention
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifierError {
    #[error("Verifier unavailable: {0}")]
    Unavailable(String),

    #[error("Verifier failed: {0}")]
    Failed(String),
}

/// Judges candidates
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Stable verifier name; used as the voter id
    fn name(&self) -> &str;

    /// Judge one candidate
    async fn judge(&self, candidate: &Candidate) -> Result<Judgement, VerifierError>;
}

/// Reachability check for candidate links
#[async_trait]
pub trait LinkProbe: Send + Sync {
    /// Check whether `url` answers
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Probe with a fixed answer, for offline use
#[derive(Debug, Clone, Default)]
pub struct StaticLinkProbe {
    reachable: HashSet<String>,
    default: bool,
}

impl StaticLinkProbe {
    /// Every link is reachable
    pub fn always() -> Self {
        Self {
            reachable: HashSet::new(),
            default: true,
        }
    }

    /// No link is reachable
    pub fn never() -> Self {
        Self::default()
    }

    /// Mark one link as reachable
    pub fn with_reachable(mut self, url: impl Into<String>) -> Self {
        self.reachable.insert(url.into());
        self
    }
}

#[async_trait]
impl LinkProbe for StaticLinkProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        self.default || self.reachable.contains(url)
    }
}

/// Probe issuing an HTTP `HEAD` request
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpLinkProbe {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpLinkProbe {
    /// Create a probe whose requests give up after `timeout`
    pub fn new(timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agora-swarm/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl LinkProbe for HttpLinkProbe {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "link probe failed");
                false
            }
        }
    }
}

/// Heuristic verifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Minimum point total for approval
    pub approval_cutoff: f64,
    /// Hosts whose links earn extra points; subdomains match too
    pub trusted_domains: Vec<String>,
    /// Timeout for HTTP link probes
    pub link_timeout_ms: u64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            approval_cutoff: 60.0,
            trusted_domains: ["github.com", "arxiv.org", "nature.com", "medium.com"]
                .into_iter()
                .map(String::from)
                .collect(),
            link_timeout_ms: 5000,
        }
    }
}

/// Verifier scoring candidates with additive checks
pub struct HeuristicVerifier {
    name: String,
    config: HeuristicConfig,
    probe: Arc<dyn LinkProbe>,
}

impl HeuristicVerifier {
    /// Create a heuristic verifier
    pub fn new(name: impl Into<String>, config: HeuristicConfig, probe: Arc<dyn LinkProbe>) -> Self {
        Self {
            name: name.into(),
            config,
            probe,
        }
    }

    fn is_trusted(&self, link: &str) -> bool {
        let Ok(parsed) = url::Url::parse(link) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        self.config.trusted_domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[async_trait]
impl Verifier for HeuristicVerifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn judge(&self, candidate: &Candidate) -> Result<Judgement, VerifierError> {
        let mut points = 0.0;
        let mut reasons = Vec::new();

        if let Some(link) = candidate.url.as_deref() {
            if self.probe.is_reachable(link).await {
                points += REACHABLE_LINK_POINTS;
                reasons.push("link reachable");
            }
            if self.is_trusted(link) {
                points += TRUSTED_DOMAIN_POINTS;
                reasons.push("trusted domain");
            }
        }

        if candidate.description.chars().count() > MIN_DESCRIPTION_CHARS {
            points += DESCRIPTION_POINTS;
            reasons.push("detailed description");
        }

        let title_len = candidate.title.chars().count();
        if title_len > 10 && title_len < 200 {
            points += TITLE_POINTS;
            reasons.push("clear title");
        }

        if candidate.prior_score > PRIOR_SCORE_FLOOR {
            points += PRIOR_SCORE_POINTS;
            reasons.push("high prior score");
        }

        let confidence = f64::min(points, MAX_CONFIDENCE);
        let accept = confidence >= self.config.approval_cutoff;
        let rationale = if reasons.is_empty() {
            "no checks passed".to_string()
        } else {
            reasons.join(", ")
        };

        debug!(verifier = %self.name, candidate = %candidate.id, confidence, accept, "candidate judged");
        Ok(Judgement {
            accept,
            confidence,
            rationale,
        })
    }
}
