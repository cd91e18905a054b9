//! # Agora Core
//!
//! Shared foundations for the Agora agent collective.
//!
//! ## Features
//!
//! - **Error Handling**: `AgoraError` and the `AgoraResult` alias every crate converts into
//! - **Configuration**: layered file + environment configuration extracted into typed settings
//! - **Telemetry**: `tracing-subscriber` bootstrap with env-filter and JSON output
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_core::{AgoraError, AgoraResult};
//!
//! fn threshold(raw: f64) -> AgoraResult<f64> {
//!     if raw > 0.0 && raw <= 1.0 {
//!         Ok(raw)
//!     } else {
//!         Err(AgoraError::invalid_input("threshold must be in (0, 1]"))
//!     }
//! }
//!
//! assert!(threshold(0.7).is_ok());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod telemetry;
pub mod traits;

pub use config::{ConfigManager, ConfigSource, ConfigValue, EnvConfigSource, FileConfigSource};
pub use error::{AgoraError, AgoraResult};
pub use telemetry::{init_tracing, LogFormat, TracingConfig};
pub use traits::Validatable;

/// Version information for the Agora Core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the Agora Core library
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "agora-core");
    }
}
