//! # Minnessyn Configuration System
//!
//! Hierarchical configuration management for the minnessyn allocation
//! tracker, following the workspace's principles of determinism and
//! safety.
//!
//! ## Features
//! - **Unified Configuration**: Single source of truth across all components
//! - **Validation**: Compile‑time and runtime validation of critical parameters
//! - **Environment Awareness**: `MINNESSYN_*` variables override any file

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod runtime;
mod telemetry;
mod transport;

pub use error::ConfigError;
pub use runtime::RuntimeConfig;
pub use telemetry::TelemetryConfig;
pub use transport::TransportConfig;

/// Top‑level configuration container for all minnessyn components.
#[derive(Debug, Serialize, Deserialize, Validate, Default)]
pub struct MinnessynConfig {
    /// Session sizing (stack-trace byte budget and everything derived).
    #[validate(nested)]
    pub runtime: RuntimeConfig,

    /// Viewer transport parameters.
    #[validate(nested)]
    pub transport: TransportConfig,

    /// Logging and metrics configuration.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl MinnessynConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/minnessyn.yaml` - base settings. If missing, defaults are used.
    /// 3. `MINNESSYN_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(MinnessynConfig::default()));

        if Path::new("config/minnessyn.yaml").exists() {
            figment = figment.merge(Yaml::file("config/minnessyn.yaml"));
        }

        figment
            .merge(Env::prefixed("MINNESSYN_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }

    /// Load configuration from a specific path for testing/validation.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(
                path.to_string_lossy().to_string(),
            )));
        }

        Figment::from(Serialized::defaults(MinnessynConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MINNESSYN_").split("__"))
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_config_validation() {
        let config = MinnessynConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn undersized_budget_fails_validation() {
        let config = MinnessynConfig {
            runtime: RuntimeConfig {
                bytes_for_stacktrace: 16,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minnessyn.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "runtime:\n  bytes_for_stacktrace: 8192\ntransport:\n  listen_addr: \"0.0.0.0:7001\""
        )
        .unwrap();

        let config = MinnessynConfig::load_from_path(&path).unwrap();
        assert_eq!(config.runtime.bytes_for_stacktrace, 8192);
        assert_eq!(config.transport.listen_addr, "0.0.0.0:7001");
        assert_eq!(config.transport.accept_timeout_secs, 30);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = MinnessynConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
