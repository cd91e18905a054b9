//! Tracing bootstrap for binaries and demos embedding Agora.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the process owner through [`init_tracing`].

use crate::{AgoraError, AgoraResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Plain,
    /// One JSON object per event
    Json,
}

/// Subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info,agora_swarm=debug`)
    pub filter: String,
    /// Output format
    pub format: LogFormat,
    /// Include the event target in each line
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Plain,
            with_target: true,
        }
    }
}

/// Install a global `tracing-subscriber` fmt subscriber.
///
/// `RUST_LOG` takes precedence over `config.filter`. Fails if a global
/// subscriber was already installed.
pub fn init_tracing(config: &TracingConfig) -> AgoraResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| AgoraError::config(format!("Invalid log filter '{}': {e}", config.filter)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| AgoraError::config(format!("Tracing already initialised: {e}")))
}
