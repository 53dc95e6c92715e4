//! Configuration loading
//!
//! Layers, lowest priority first: embedded defaults, `config/local`, an
//! explicit file, then `MONTAGE_*` environment variables.

use crate::error::{AgentError, AgentErrorKind, Result};
use crate::orchestrator::OrchestratorSettings;
use crate::scheduler::ExecutorConfig;
use crate::validator::ValidatorConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Complete orchestration configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MontageConfig {
    /// Plan validator limits
    pub validator: ValidatorConfig,
    /// Scheduler limits and policies
    pub executor: ExecutorConfig,
    /// Planning cycle settings
    pub orchestrator: OrchestratorSettings,
}

impl MontageConfig {
    /// Load configuration from files and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        // prefix_separator("_") keeps MONTAGE_EXECUTOR__X working; config-rs
        // otherwise expects MONTAGE__EXECUTOR__X.
        let config = builder
            .add_source(
                Environment::with_prefix("MONTAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(configuration_error)?;

        let config: Self = config.try_deserialize().map_err(configuration_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without other layers
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(configuration_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()
    }
}

fn configuration_error(err: impl std::fmt::Display) -> AgentError {
    AgentError::new(AgentErrorKind::Configuration {
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_tools::RiskLevel;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults_match_code_defaults() {
        let config = MontageConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, MontageConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = MontageConfig::from_toml(
            r#"
            [executor]
            max_retries = 3
            doom_loop_threshold = 5
            parallel = true

            [orchestrator]
            approval_risk_threshold = "critical"
            "#,
        )
        .unwrap();
        assert_eq!(config.executor.max_retries, 3);
        assert!(config.executor.parallel);
        assert_eq!(config.executor.step_timeout_ms, 30_000);
        assert_eq!(config.orchestrator.approval_risk_threshold, RiskLevel::Critical);
        assert_eq!(config.validator.max_steps, 50);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[validator]\nmax_steps = 7").unwrap();

        let config = MontageConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.validator.max_steps, 7);
        assert_eq!(config.orchestrator.max_iterations, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_configuration_error() {
        let err = MontageConfig::load(Some(Path::new("/nonexistent/montage.toml"))).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_retries_beyond_loop_threshold_rejected() {
        let err = MontageConfig::from_toml("[executor]\nmax_retries = 2").unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[executor]\nmax_retries = 4\ndoom_loop_threshold = 4").unwrap();
        let err = MontageConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("doom_loop_threshold"));
    }

    #[test]
    fn test_bad_value_is_configuration_error() {
        let err = MontageConfig::from_toml("[executor]\nmax_retries = \"many\"").unwrap_err();
        assert!(matches!(err.kind(), AgentErrorKind::Configuration { .. }));
    }
}
