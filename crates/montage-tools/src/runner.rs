//! Runner - Tool execution engine
//!
//! This module provides the [`ToolExecutor`] implementation backed by a
//! [`ToolRegistry`]:
//! - Enabled / risk gate
//! - Argument validation against the declared schema
//! - Duration measurement and logging
//!
//! Timeouts, retries and budgets belong to the scheduler in montage-core.

use crate::catalog::{ToolCatalog, ToolExecutor};
use crate::context::EditingContext;
use crate::error::{Error, Result};
use crate::registry::{RiskLevel, ToolOutcome, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Configuration for the tool runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Validate arguments against the schema before every call
    pub validate_args: bool,
    /// Whether critical-risk tools may run
    pub allow_critical: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            validate_args: true,
            allow_critical: false,
        }
    }
}

impl RunnerConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable argument validation
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Allow or disallow critical-risk tools
    #[must_use]
    pub fn with_critical(mut self, allowed: bool) -> Self {
        self.allow_critical = allowed;
        self
    }
}

/// Tool runner for executing registered tools
#[derive(Clone)]
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    config: RunnerConfig,
}

impl ToolRunner {
    /// Create a new tool runner
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, RunnerConfig::default())
    }

    /// Get the registry
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Check if a tool can be executed (without actually executing)
    pub fn can_execute(&self, tool_name: &str) -> Result<bool> {
        let definition = self
            .registry
            .definition(tool_name)
            .ok_or_else(|| Error::NotFound(tool_name.to_string()))?;

        if !definition.enabled {
            return Ok(false);
        }
        if !self.config.allow_critical && definition.risk_level == RiskLevel::Critical {
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ToolRunner {
    #[instrument(skip(self, args, context), fields(tool = %name))]
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        context: &EditingContext,
    ) -> Result<ToolOutcome> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if !self.can_execute(name)? {
            warn!(tool = %name, "Tool execution blocked");
            return Err(Error::PermissionDenied(format!(
                "tool '{}' is disabled or exceeds the allowed risk level",
                name
            )));
        }

        if self.config.validate_args {
            let validation = self.registry.validate_args(name, &args);
            if !validation.valid {
                return Err(Error::InvalidInput(validation.errors.join("; ")));
            }
        }

        let start = Instant::now();
        debug!(tool = %name, "Executing tool");

        let mut outcome = match tool.execute(args, context).await {
            Ok(outcome) => outcome,
            Err(Error::Execution(msg)) | Err(Error::Network(msg)) => {
                let duration = start.elapsed().as_millis() as u64;
                warn!(tool = %name, error = %msg, "Tool execution failed");
                ToolOutcome::failure(msg, duration)
            }
            Err(e) => return Err(e),
        };

        if outcome.duration_ms == 0 {
            outcome.duration_ms = start.elapsed().as_millis() as u64;
        }

        debug!(
            tool = %name,
            success = %outcome.success,
            duration_ms = %outcome.duration_ms,
            "Tool execution completed"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Tool, ToolDefinition};
    use serde_json::json;

    struct EchoTool {
        definition: ToolDefinition,
    }

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(
            &self,
            args: serde_json::Value,
            _context: &EditingContext,
        ) -> Result<ToolOutcome> {
            if args.get("fail").is_some() {
                return Err(Error::Execution("backend busy".to_string()));
            }
            Ok(ToolOutcome::success(args, 0))
        }
    }

    fn runner(risk: RiskLevel) -> ToolRunner {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool {
            definition: ToolDefinition::new("echo", "Echo arguments")
                .with_risk_level(risk)
                .with_parameters(json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}}
                })),
        }));
        ToolRunner::with_defaults(Arc::new(registry))
    }

    #[test]
    fn test_runner_config() {
        let config = RunnerConfig::new().with_validation(false).with_critical(true);
        assert!(!config.validate_args);
        assert!(config.allow_critical);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let runner = runner(RiskLevel::Low);
        let outcome = runner
            .execute("echo", json!({"text": "hi"}), &EditingContext::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(json!({"text": "hi"})));
    }

    #[tokio::test]
    async fn test_execute_error_becomes_failure() {
        let runner = runner(RiskLevel::Low);
        let outcome = runner
            .execute("echo", json!({"fail": true}), &EditingContext::new())
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("backend busy"));
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_args() {
        let runner = runner(RiskLevel::Low);
        let err = runner
            .execute("echo", json!({"text": 5}), &EditingContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_execute_unknown_and_critical() {
        let runner = runner(RiskLevel::Critical);
        let ctx = EditingContext::new();
        assert!(matches!(
            runner.execute("missing", json!({}), &ctx).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            runner.execute("echo", json!({}), &ctx).await,
            Err(Error::PermissionDenied(_))
        ));
        assert!(!runner.can_execute("echo").unwrap());
    }
}
