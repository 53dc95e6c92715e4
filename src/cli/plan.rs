//! `montage validate` and `montage order`

use super::PlanArgs;
use anyhow::{Context, Result};
use montage_core::{
    execution_order, AgentErrorKind, MontageConfig, Plan, PlanReview, PlanValidator,
};
use montage_tools::{EditingContext, ToolDefinition, ToolRegistry};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file {}", what, path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {} file {}", what, path.display()))
}

/// Load a catalog of declared tools
pub fn load_catalog(path: &Path) -> Result<ToolRegistry> {
    let definitions: Vec<ToolDefinition> = read_json(path, "catalog")?;
    info!(tools = definitions.len(), "Catalog loaded");
    Ok(ToolRegistry::from_definitions(definitions))
}

/// Load the editing context, or an empty one
pub fn load_context(path: Option<&Path>) -> Result<EditingContext> {
    match path {
        Some(path) => read_json(path, "context"),
        None => Ok(EditingContext::new()),
    }
}

/// Validate the plan in `args`, returning the typed plan and its warnings
pub fn check(args: &PlanArgs, config_path: Option<&Path>) -> Result<PlanReview> {
    let config = MontageConfig::load(config_path).context("Failed to load configuration")?;
    let catalog = Arc::new(load_catalog(&args.catalog)?);
    let context = load_context(args.context.as_deref())?;
    let candidate: Value = read_json(&args.plan, "plan")?;

    let validator = PlanValidator::new(catalog, config.validator);
    match validator.review_candidate(&candidate, &context) {
        Ok(review) => Ok(review),
        Err(err) => {
            if let AgentErrorKind::PlanValidationFailed { validation_errors } = err.kind() {
                for problem in validation_errors {
                    eprintln!("  - {}", problem);
                }
            }
            Err(err).context("Plan is not valid")
        }
    }
}

pub fn validate(args: &PlanArgs, config_path: Option<&Path>) -> Result<()> {
    let PlanReview {
        plan,
        warnings,
        estimated_time_secs,
    } = check(args, config_path)?;
    println!(
        "Plan is valid: {} step{}, goal \"{}\", about {:.1}s",
        plan.len(),
        if plan.len() == 1 { "" } else { "s" },
        plan.goal,
        estimated_time_secs
    );
    for warning in warnings {
        println!("  warning {}: {}", warning.code, warning.message);
    }
    Ok(())
}

pub fn order(path: &Path) -> Result<()> {
    let plan: Plan = read_json(path, "plan")?;
    let ordered = execution_order(&plan).context("Plan cannot be ordered")?;
    for (position, step) in ordered.iter().enumerate() {
        println!("{:>3}. {} ({})", position + 1, step.id, step.tool);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn write_json(value: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    fn plan_args(plan: &NamedTempFile, catalog: &NamedTempFile) -> PlanArgs {
        PlanArgs {
            plan: plan.path().to_path_buf(),
            catalog: catalog.path().to_path_buf(),
            context: None,
        }
    }

    fn catalog_file() -> NamedTempFile {
        let schema = json!({"type": "object", "properties": {"clipId": {"type": "string"}}});
        write_json(&json!([
            {"name": "list_clips", "description": "List clips", "parameters": schema,
             "riskLevel": "low", "category": "analysis", "readOnly": true},
            {"name": "trim_clip", "description": "Trim a clip", "parameters": schema,
             "riskLevel": "medium", "category": "clip"}
        ]))
    }

    fn plan_value(tool: &str) -> Value {
        json!({
            "goal": "Trim the intro",
            "steps": [{
                "id": "s1",
                "tool": tool,
                "args": {"clipId": "clip_1"},
                "description": "Trim it",
                "riskLevel": "low",
                "estimatedDuration": 1.0
            }],
            "estimatedTotalDuration": 1.0,
            "requiresApproval": false,
            "rollbackStrategy": "undo"
        })
    }

    #[test]
    fn test_check_accepts_valid_plan() {
        let catalog = catalog_file();
        let plan = write_json(&plan_value("trim_clip"));

        let checked = check(&plan_args(&plan, &catalog), None).unwrap();
        assert_eq!(checked.plan.len(), 1);
        assert_eq!(checked.estimated_time_secs, 1.0);
        // trim_clip is rated medium in the catalog
        assert_eq!(checked.warnings.len(), 1);
        assert_eq!(checked.warnings[0].code, "RISK_UNDERSTATED");
    }

    #[test]
    fn test_check_rejects_unknown_tool() {
        let catalog = catalog_file();
        let plan = write_json(&plan_value("split_clip"));

        let err = check(&plan_args(&plan, &catalog), None).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown tool 'split_clip'"));
    }

    #[test]
    fn test_missing_context_file() {
        let err = load_context(Some(&PathBuf::from("/nonexistent/context.json"))).unwrap_err();
        assert!(err.to_string().contains("context"));
    }
}
