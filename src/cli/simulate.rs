//! `montage simulate`
//!
//! Runs a validated plan through the real scheduler with tools that only
//! echo their resolved arguments, so dependency order, reference resolution
//! and budgets can be checked without touching a project.

use super::plan::check;
use super::PlanArgs;
use anyhow::{Context, Result};
use montage_core::{MontageConfig, PlanExecutor, ProgressEvent, ProgressObserver};
use montage_tools::{EditingContext, ToolOutcome};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Tool backend that succeeds with its arguments as data
pub struct EchoTools;

#[async_trait::async_trait]
impl montage_tools::ToolExecutor for EchoTools {
    async fn execute(
        &self,
        _name: &str,
        args: Value,
        _context: &EditingContext,
    ) -> montage_tools::Result<ToolOutcome> {
        Ok(ToolOutcome::success(args, 0))
    }
}

struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StepStarted { step_id, tool } => {
                info!(step_id = %step_id, tool = %tool, "Step started");
            }
            ProgressEvent::StepFailed { step_id, error, .. } => {
                info!(step_id = %step_id, error = %error, "Step failed");
            }
            other => info!(event = ?other, "Progress"),
        }
    }
}

pub async fn run(args: &PlanArgs, config_path: Option<&Path>) -> Result<()> {
    let plan = check(args, config_path)?.plan;
    let config = MontageConfig::load(config_path).context("Failed to load configuration")?;
    let context = super::plan::load_context(args.context.as_deref())?;

    let executor = PlanExecutor::new(Arc::new(EchoTools), config.executor);
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = executor
        .execute(&plan, &context, &cancel, Some(&LogObserver))
        .await
        .context("Simulation failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::{Plan, PlanStep};
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_resolves_references() {
        let plan = Plan::new("Chain")
            .with_step(PlanStep::new("a", "import_asset").with_args(json!({"assetId": "asset_1"})))
            .with_step(
                PlanStep::new("b", "insert_clip")
                    .with_args(json!({"assetId": {"fromStep": "a", "path": "data.assetId"}}))
                    .depends_on("a"),
            );
        let executor = PlanExecutor::new(Arc::new(EchoTools), Default::default());

        let result = executor
            .execute(&plan, &EditingContext::new(), &CancellationToken::new(), Some(&LogObserver))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.completed("b").unwrap().args, json!({"assetId": "asset_1"}));
    }
}
