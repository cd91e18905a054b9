//! Layered settings for the collective.
//!
//! Settings are read from an optional TOML or JSON file and then overridden
//! by environment variables, e.g. `AGORA__CONSENSUS__THRESHOLD=0.8`.
//! Every section falls back to its defaults when absent.

use crate::{
    consensus::ConsensusConfig,
    error::{SwarmError, SwarmResult},
    improvement::ImprovementConfig,
    router::RouterConfig,
    stake::RandomStake,
    strategy::StrategyConfig,
    verification::HeuristicConfig,
};
use agora_core::{
    AgoraError, AgoraResult, ConfigManager, EnvConfigSource, FileConfigSource, TracingConfig, Validatable,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "AGORA";

/// Range placeholder stakes are drawn from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StakeSettings {
    pub min: f64,
    pub max: f64,
}

impl Default for StakeSettings {
    fn default() -> Self {
        Self {
            min: 1000.0,
            max: 5000.0,
        }
    }
}

impl StakeSettings {
    pub fn source(&self) -> RandomStake {
        RandomStake::new(self.min..self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSettings {
    pub timeout_ms: u64,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl SettlementSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// All settings of the collective
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSettings {
    pub consensus: ConsensusConfig,
    pub heuristics: HeuristicConfig,
    pub stake: StakeSettings,
    pub router: RouterConfig,
    pub strategy: StrategyConfig,
    pub improvement: ImprovementConfig,
    pub settlement: SettlementSettings,
    pub logging: TracingConfig,
}

impl SwarmSettings {
    /// Load settings from `path` (if given) overlaid with `env_prefix` variables
    pub fn load(path: Option<&Path>, env_prefix: &str) -> SwarmResult<Self> {
        let mut manager = ConfigManager::new();
        if let Some(path) = path {
            manager = manager.add_source(FileConfigSource::auto_detect(path)?);
        }
        manager = manager.add_source(EnvConfigSource::new(env_prefix));
        manager.load()?;

        let settings: Self = manager.extract("")?;
        settings.validate()?;

        debug!(path = ?path, env_prefix, "settings loaded");
        Ok(settings)
    }
}

impl Validatable for SwarmSettings {
    fn validate(&self) -> AgoraResult<()> {
        let invalid = |msg: String| Err(AgoraError::from(SwarmError::InvalidConfiguration(msg)));

        self.consensus.check().map_err(AgoraError::from)?;

        if !(self.heuristics.approval_cutoff.is_finite()
            && (0.0..=100.0).contains(&self.heuristics.approval_cutoff))
        {
            return invalid(format!(
                "heuristic approval cutoff must be in [0, 100], got {}",
                self.heuristics.approval_cutoff
            ));
        }
        if self.heuristics.link_timeout_ms == 0 {
            return invalid("link timeout must be positive".to_string());
        }
        if !(self.stake.min > 0.0 && self.stake.min < self.stake.max && self.stake.max.is_finite()) {
            return invalid(format!(
                "stake range must be positive and non-empty, got {}..{}",
                self.stake.min, self.stake.max
            ));
        }
        if !(self.strategy.improvement_threshold > 0.0 && self.strategy.improvement_threshold <= 1.0) {
            return invalid(format!(
                "improvement threshold must be in (0, 1], got {}",
                self.strategy.improvement_threshold
            ));
        }
        if !(self.strategy.latency_ceiling_ms > 0.0) {
            return invalid("latency ceiling must be positive".to_string());
        }
        if self.improvement.advisor_timeout_ms == 0 || self.settlement.timeout_ms == 0 {
            return invalid("collaborator timeouts must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SwarmSettings::default();
        assert!(settings.is_valid());
        assert_eq!(settings.consensus.threshold, 0.70);
        assert_eq!(settings.strategy.min_samples, 10);
        assert_eq!(settings.router.task_priority, 8);
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut settings = SwarmSettings::default();
        settings.consensus.threshold = 1.2;
        assert!(!settings.is_valid());

        let mut settings = SwarmSettings::default();
        settings.stake.min = 5000.0;
        assert!(!settings.is_valid());

        let mut settings = SwarmSettings::default();
        settings.consensus.verifier_timeout_ms = 0;
        assert!(matches!(settings.validate(), Err(AgoraError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[consensus]
threshold = 0.8

[strategy]
min_samples = 20

[heuristics]
trusted_domains = ["example.org"]
"#
        )
        .unwrap();

        let settings = SwarmSettings::load(Some(file.path()), "AGORA_SETTINGS_TEST_UNUSED").unwrap();
        assert_eq!(settings.consensus.threshold, 0.8);
        assert_eq!(settings.consensus.verifier_timeout_ms, 10_000);
        assert_eq!(settings.strategy.min_samples, 20);
        assert_eq!(settings.heuristics.trusted_domains, vec!["example.org".to_string()]);
        assert_eq!(settings.heuristics.approval_cutoff, 60.0);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[consensus]\nthreshold = 0.0").unwrap();

        let err = SwarmSettings::load(Some(file.path()), "AGORA_SETTINGS_TEST_UNUSED").unwrap_err();
        assert!(matches!(err, SwarmError::Core(AgoraError::Configuration(_))));
    }
}
