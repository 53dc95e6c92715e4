//! Plan validation
//!
//! Turns a candidate plan (raw producer JSON) into a typed [`Plan`] or a
//! plan-validation error listing every problem found. Checks run in three
//! groups and stop at the first group that reports anything:
//!
//! 1. shape of the plan and its steps, then tool argument schemas
//! 2. placeholder ids and editing-context ids, then step references
//! 3. the dependency graph (unknown ids, self-dependencies, cycles)

use crate::error::{wrap, AgentError, AgentErrorKind, AgentPhase, Result};
use crate::plan::{Plan, PlanStep};
use crate::references::{self, FoundReference};
use montage_tools::{EditingContext, EntityKind, RiskLevel, ToolCatalog};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Id values a planner invents when it does not know the real id
static PLACEHOLDER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)_from_catalog$",
        r"(?i)^(placeholder|unknown|tbd|todo|undefined|null|none|n/a|xxx+|example|sample|dummy|fake|id)$",
        r"(?i)placeholder",
        r"^<[^>]*>$",
        r"^\{\{?[^}]*\}?\}$",
        r"^\$\{[^}]*\}$",
        r"(?i)^(video|audio|track)[_-]?\d+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("placeholder patterns are compile-time constants"))
    .collect()
});

/// Whether an id value looks invented rather than copied
#[must_use]
pub fn looks_like_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || PLACEHOLDER_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Validator limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Steps allowed per plan
    pub max_steps: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { max_steps: 50 }
    }
}

/// A non-fatal finding about an accepted plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Stable code, e.g. `HIGH_RISK`
    pub code: String,
    /// Human-readable detail
    pub message: String,
}

impl ValidationWarning {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
        }
    }
}

/// An accepted plan with the validator's warnings
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReview {
    /// The typed plan
    pub plan: Plan,
    /// Findings that do not block execution
    pub warnings: Vec<ValidationWarning>,
    /// Sum of the steps' estimated durations, in seconds
    pub estimated_time_secs: f64,
}

/// Validates candidate plans against a tool catalog
#[derive(Clone)]
pub struct PlanValidator {
    catalog: Arc<dyn ToolCatalog>,
    config: ValidatorConfig,
}

impl PlanValidator {
    /// Create a validator
    #[must_use]
    pub fn new(catalog: Arc<dyn ToolCatalog>, config: ValidatorConfig) -> Self {
        Self { catalog, config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate an already-typed plan
    pub fn validate_plan(&self, plan: &Plan, context: &EditingContext) -> Result<()> {
        let candidate = serde_json::to_value(plan).map_err(|e| wrap(e, AgentPhase::Planning))?;
        self.validate_candidate(&candidate, context).map(|_| ())
    }

    /// Validate raw producer output and return the typed plan
    pub fn validate_candidate(&self, candidate: &Value, context: &EditingContext) -> Result<Plan> {
        let mut errors = self.check_structure(candidate);
        if errors.is_empty() {
            errors.extend(self.check_arguments(candidate));
        }
        reject_if_any(errors, "structure")?;

        let plan: Plan = serde_json::from_value(candidate.clone()).map_err(|e| {
            AgentError::new(AgentErrorKind::PlanValidationFailed {
                validation_errors: vec![format!("plan does not match the expected shape: {}", e)],
            })
        })?;

        let mut errors = check_context_bindings(&plan, context);
        errors.extend(check_references(&plan));
        reject_if_any(errors, "references")?;

        reject_if_any(check_dependencies(&plan), "dependencies")?;

        info!(steps = plan.steps.len(), goal = %plan.goal, "Plan accepted");
        Ok(plan)
    }

    /// Validate raw producer output and collect non-fatal warnings
    pub fn review_candidate(
        &self,
        candidate: &Value,
        context: &EditingContext,
    ) -> Result<PlanReview> {
        let plan = self.validate_candidate(candidate, context)?;
        let warnings = self.warnings(&plan);
        for warning in &warnings {
            warn!(code = %warning.code, message = %warning.message, "Plan warning");
        }
        let estimated_time_secs = plan.steps.iter().map(|s| s.estimated_duration).sum();
        Ok(PlanReview {
            plan,
            warnings,
            estimated_time_secs,
        })
    }

    fn warnings(&self, plan: &Plan) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let risky: Vec<&str> = plan
            .steps
            .iter()
            .filter(|s| s.risk_level >= RiskLevel::High)
            .map(|s| s.id.as_str())
            .collect();
        if !risky.is_empty() {
            warnings.push(ValidationWarning::new(
                "HIGH_RISK",
                format!("plan contains high-risk steps: {}", risky.join(", ")),
            ));
        }
        for step in &plan.steps {
            let Some(definition) = self.catalog.get_definition(&step.tool) else {
                continue;
            };
            if step.risk_level < definition.risk_level {
                warnings.push(ValidationWarning::new(
                    "RISK_UNDERSTATED",
                    format!(
                        "step '{}' declares {} risk but tool '{}' is rated {}",
                        step.id, step.risk_level, step.tool, definition.risk_level
                    ),
                ));
            }
        }
        warnings
    }

    fn check_structure(&self, candidate: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        let Some(obj) = candidate.as_object() else {
            return vec!["plan must be a JSON object".to_string()];
        };

        if !obj.get("goal").and_then(Value::as_str).is_some_and(|g| !g.trim().is_empty()) {
            errors.push("goal must be a non-empty string".to_string());
        }
        if !obj.get("requiresApproval").is_some_and(Value::is_boolean) {
            errors.push("requiresApproval must be a boolean".to_string());
        }
        if !obj.get("rollbackStrategy").is_some_and(Value::is_string) {
            errors.push("rollbackStrategy must be a string".to_string());
        }
        if !obj.get("estimatedTotalDuration").is_some_and(Value::is_number) {
            errors.push("estimatedTotalDuration must be a number".to_string());
        }

        let Some(steps) = obj.get("steps").and_then(Value::as_array) else {
            errors.push("steps must be an array".to_string());
            return errors;
        };
        if steps.is_empty() {
            errors.push("steps must contain at least one step".to_string());
        }
        if steps.len() > self.config.max_steps {
            errors.push(format!(
                "plan has {} steps, maximum is {}",
                steps.len(),
                self.config.max_steps
            ));
        }

        let mut seen = HashSet::new();
        for (index, step) in steps.iter().enumerate() {
            let Some(step) = step.as_object() else {
                errors.push(format!("steps[{}] must be an object", index));
                continue;
            };
            let label = match step.get("id").and_then(Value::as_str) {
                Some(id) if !id.trim().is_empty() => {
                    if !seen.insert(id) {
                        errors.push(format!("duplicate step id '{}'", id));
                    }
                    format!("step '{}'", id)
                }
                _ => {
                    errors.push(format!("steps[{}] must have a non-empty string id", index));
                    format!("steps[{}]", index)
                }
            };
            self.check_step_fields(step, &label, &mut errors);
        }
        errors
    }

    fn check_step_fields(&self, step: &Map<String, Value>, label: &str, errors: &mut Vec<String>) {
        match step.get("tool").and_then(Value::as_str) {
            Some(tool) if !tool.is_empty() => {
                if !self.catalog.has_tool(tool) {
                    match self.catalog.get_definition(tool) {
                        Some(_) => errors.push(format!("{}: tool '{}' is disabled", label, tool)),
                        None => errors.push(format!("{}: unknown tool '{}'", label, tool)),
                    }
                }
            }
            _ => errors.push(format!("{}: tool must be a non-empty string", label)),
        }
        if !step.get("description").and_then(Value::as_str).is_some_and(|d| !d.trim().is_empty()) {
            errors.push(format!("{}: description must be a non-empty string", label));
        }
        match step.get("riskLevel").and_then(Value::as_str) {
            Some(level) if RiskLevel::parse(level).is_some() => {}
            Some(level) => errors.push(format!(
                "{}: riskLevel '{}' must be one of low, medium, high, critical",
                label, level
            )),
            None => errors.push(format!("{}: riskLevel must be a string", label)),
        }
        if !step.get("estimatedDuration").is_some_and(Value::is_number) {
            errors.push(format!("{}: estimatedDuration must be a number", label));
        }
        if !step.get("args").is_some_and(Value::is_object) {
            errors.push(format!("{}: args must be an object", label));
        }
        if let Some(deps) = step.get("dependsOn") {
            let valid = deps
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string));
            if !valid {
                errors.push(format!("{}: dependsOn must be an array of step ids", label));
            }
        }
    }

    /// Runs only on structurally sound candidates
    fn check_arguments(&self, candidate: &Value) -> Vec<String> {
        let mut errors = Vec::new();
        let steps = candidate
            .get("steps")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for step in steps {
            let (Some(id), Some(tool), Some(args)) = (
                step.get("id").and_then(Value::as_str),
                step.get("tool").and_then(Value::as_str),
                step.get("args"),
            ) else {
                continue;
            };
            let Some(definition) = self.catalog.get_definition(tool) else {
                continue;
            };
            let normalized = references::normalize_for_validation(args, &definition.parameters);
            let validation = self.catalog.validate_args(tool, &normalized);
            if !validation.valid {
                debug!(step_id = %id, tool = %tool, errors = validation.errors.len(), "Argument validation failed");
                errors.extend(
                    validation
                        .errors
                        .into_iter()
                        .map(|e| format!("step '{}' ({}): {}", id, tool, e)),
                );
            }
        }
        errors
    }
}

fn reject_if_any(errors: Vec<String>, stage: &str) -> Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    warn!(stage, errors = errors.len(), "Plan rejected");
    Err(AgentError::new(AgentErrorKind::PlanValidationFailed {
        validation_errors: errors,
    }))
}

/// Placeholder ids and ids missing from the editing context
fn check_context_bindings(plan: &Plan, context: &EditingContext) -> Vec<String> {
    let mut errors = Vec::new();
    for step in &plan.steps {
        visit_id_args(&step.args, "$", &mut |location: &str, key: &str, value: &str| {
            if looks_like_placeholder(value) {
                errors.push(format!(
                    "step '{}': {} '{}' looks like a placeholder; copy an exact id from the editing context",
                    step.id, location, value
                ));
                return;
            }
            if let Some(kind) = EntityKind::from_arg_key(key) {
                if context.contains(kind, value) == Some(false) {
                    errors.push(format!(
                        "step '{}': {} '{}' is not a known {} id in the current editing context",
                        step.id,
                        location,
                        value,
                        kind.as_str()
                    ));
                }
            }
        });
    }
    errors
}

/// Call `f(location, key, value)` for every string argument whose key ends in `Id`
fn visit_id_args<F>(value: &Value, location: &str, f: &mut F)
where
    F: FnMut(&str, &str, &str),
{
    if references::as_reference(value).is_some() {
        return;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_location = format!("{}.{}", location, key);
                match child {
                    Value::String(s) if key.ends_with("Id") => f(&child_location, key, s),
                    _ => visit_id_args(child, &child_location, f),
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit_id_args(child, &format!("{}[{}]", location, index), f);
            }
        }
        _ => {}
    }
}

/// Step references must target an earlier, declared dependency and read from `data`
fn check_references(plan: &Plan) -> Vec<String> {
    let ids: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
    let mut earlier: HashSet<&str> = HashSet::new();
    let mut errors = Vec::new();

    for step in &plan.steps {
        for FoundReference { location, reference } in references::collect(&step.args) {
            let target = reference.from_step.as_str();
            if target == step.id {
                errors.push(format!(
                    "step '{}': reference at {} reads from the step itself",
                    step.id, location
                ));
            } else if !ids.contains(target) {
                errors.push(format!(
                    "step '{}': reference at {} targets unknown step '{}'",
                    step.id, location, target
                ));
            } else if !earlier.contains(target) {
                errors.push(format!(
                    "step '{}': reference at {} reads from '{}', which comes later in the plan",
                    step.id, location, target
                ));
            } else if !step.depends_on.iter().any(|d| d == target) {
                errors.push(format!(
                    "step '{}': reference at {} reads from '{}', which is not listed in dependsOn",
                    step.id, location, target
                ));
            }
            if !reference.reads_data() {
                errors.push(format!(
                    "step '{}': reference at {} must read from 'data', got '{}'",
                    step.id, location, reference.path
                ));
            }
        }
        earlier.insert(step.id.as_str());
    }
    errors
}

/// Unknown and self dependencies, then the first cycle found
fn check_dependencies(plan: &Plan) -> Vec<String> {
    let ids: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
    let mut errors = Vec::new();
    for step in &plan.steps {
        for dep in &step.depends_on {
            if *dep == step.id {
                errors.push(format!("step '{}' depends on itself", step.id));
            } else if !ids.contains(dep.as_str()) {
                errors.push(format!("step '{}' depends on unknown step '{}'", step.id, dep));
            }
        }
    }
    if let Some(node) = find_cycle(plan) {
        errors.push(format!("Circular dependency detected involving step '{}'", node));
    }
    errors
}

/// Depth-first search with an on-stack set; returns the first revisited node
fn find_cycle(plan: &Plan) -> Option<String> {
    let graph: HashMap<&str, &PlanStep> = plan.steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();

    fn visit<'a>(
        id: &'a str,
        graph: &HashMap<&'a str, &'a PlanStep>,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Option<String> {
        visited.insert(id);
        on_stack.insert(id);
        if let Some(&step) = graph.get(id) {
            for dep in &step.depends_on {
                let dep = dep.as_str();
                // self and unknown dependencies are reported separately
                if dep == id || !graph.contains_key(dep) {
                    continue;
                }
                if on_stack.contains(dep) {
                    return Some(dep.to_string());
                }
                if !visited.contains(dep) {
                    if let Some(node) = visit(dep, graph, visited, on_stack) {
                        return Some(node);
                    }
                }
            }
        }
        on_stack.remove(id);
        None
    }

    for step in &plan.steps {
        let id = step.id.as_str();
        if !visited.contains(id) {
            if let Some(node) = visit(id, &graph, &mut visited, &mut on_stack) {
                return Some(node);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_tools::{ArgValidation, ToolDefinition, ToolRegistry};
    use serde_json::json;

    mockall::mock! {
        Catalog {}
        impl ToolCatalog for Catalog {
            fn has_tool(&self, name: &str) -> bool;
            fn get_definition(&self, name: &str) -> Option<ToolDefinition>;
            fn validate_args(&self, name: &str, args: &Value) -> ArgValidation;
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::from_definitions(vec![
            ToolDefinition::new("import_asset", "Import media").with_parameters(json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            })),
            ToolDefinition::new("insert_clip", "Place an asset").with_parameters(json!({
                "type": "object",
                "properties": {
                    "assetId": {"type": "string"},
                    "trackId": {"type": "string"},
                    "at": {"type": "number"}
                },
                "required": ["assetId"]
            })),
        ]))
    }

    fn validator() -> PlanValidator {
        PlanValidator::new(registry(), ValidatorConfig::default())
    }

    fn step(id: &str, tool: &str, args: Value, deps: &[&str]) -> Value {
        json!({
            "id": id,
            "tool": tool,
            "args": args,
            "description": format!("run {}", tool),
            "riskLevel": "low",
            "estimatedDuration": 1,
            "dependsOn": deps
        })
    }

    fn candidate(steps: Vec<Value>) -> Value {
        json!({
            "goal": "Add b-roll",
            "steps": steps,
            "estimatedTotalDuration": 2,
            "requiresApproval": false,
            "rollbackStrategy": "undo"
        })
    }

    fn messages(err: AgentError) -> Vec<String> {
        match err.kind() {
            AgentErrorKind::PlanValidationFailed { validation_errors } => validation_errors.clone(),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_accepts_valid_plan() {
        let plan = validator()
            .validate_candidate(
                &candidate(vec![
                    step("s1", "import_asset", json!({"path": "/clips/a.mov"}), &[]),
                    step(
                        "s2",
                        "insert_clip",
                        json!({"assetId": {"fromStep": "s1", "path": "data.assetId"}}),
                        &["s1"],
                    ),
                ]),
                &EditingContext::new(),
            )
            .unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.step("s2").unwrap().depends_on, vec!["s1"]);
    }

    #[test]
    fn test_structural_errors_accumulate() {
        let bad = json!({
            "goal": "",
            "steps": [
                {"id": "s1", "tool": "warp", "args": {}, "description": "x", "riskLevel": "extreme", "estimatedDuration": "soon"},
                {"id": "s1", "tool": "import_asset", "args": [], "description": "", "riskLevel": "low", "estimatedDuration": 1, "dependsOn": "s0"}
            ],
            "estimatedTotalDuration": 1,
            "requiresApproval": "no",
            "rollbackStrategy": "undo"
        });
        let errors = messages(validator().validate_candidate(&bad, &EditingContext::new()).unwrap_err());
        let joined = errors.join("\n");
        for expected in [
            "goal must be a non-empty string",
            "requiresApproval must be a boolean",
            "unknown tool 'warp'",
            "riskLevel 'extreme'",
            "estimatedDuration must be a number",
            "duplicate step id 's1'",
            "args must be an object",
            "description must be a non-empty string",
            "dependsOn must be an array",
        ] {
            assert!(joined.contains(expected), "missing {expected:?} in {joined}");
        }
    }

    #[test]
    fn test_step_limit() {
        let validator = PlanValidator::new(registry(), ValidatorConfig { max_steps: 1 });
        let err = validator
            .validate_candidate(
                &candidate(vec![
                    step("a", "import_asset", json!({"path": "a"}), &[]),
                    step("b", "import_asset", json!({"path": "b"}), &[]),
                ]),
                &EditingContext::new(),
            )
            .unwrap_err();
        assert!(messages(err)[0].contains("maximum is 1"));
    }

    #[test]
    fn test_schema_errors_use_normalized_references() {
        let err = validator()
            .validate_candidate(
                &candidate(vec![
                    step("s1", "import_asset", json!({}), &[]),
                    step(
                        "s2",
                        "insert_clip",
                        json!({"assetId": {"fromStep": "s1", "path": "data.assetId"}, "at": "later"}),
                        &["s1"],
                    ),
                ]),
                &EditingContext::new(),
            )
            .unwrap_err();
        let errors = messages(err);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].starts_with("step 's1' (import_asset)"));
        assert!(errors[1].starts_with("step 's2' (insert_clip)"));
    }

    #[test]
    fn test_placeholder_ids_rejected() {
        let err = validator()
            .validate_candidate(
                &candidate(vec![step(
                    "s1",
                    "insert_clip",
                    json!({"assetId": "asset_from_catalog", "trackId": "video_1"}),
                    &[],
                )]),
                &EditingContext::new(),
            )
            .unwrap_err();
        let errors = messages(err);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.contains("looks like a placeholder")));
    }

    #[test]
    fn test_context_ids_cross_checked() {
        let context = EditingContext::new().with_asset("a1").with_track("t1");
        let ok = candidate(vec![step(
            "s1",
            "insert_clip",
            json!({"assetId": "a1", "trackId": "t1"}),
            &[],
        )]);
        assert!(validator().validate_candidate(&ok, &context).is_ok());

        let stale = candidate(vec![step(
            "s1",
            "insert_clip",
            json!({"assetId": "a9", "trackId": "t1"}),
            &[],
        )]);
        let errors = messages(validator().validate_candidate(&stale, &context).unwrap_err());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'a9' is not a known asset id"));

        // empty id sets are not checked
        let no_tracks = EditingContext::new().with_asset("a9");
        assert!(validator().validate_candidate(&stale, &no_tracks).is_ok());
    }

    #[test]
    fn test_reference_requires_dependency() {
        let refs = json!({"assetId": {"fromStep": "s1", "path": "data.assetId"}});
        let missing_dep = candidate(vec![
            step("s1", "import_asset", json!({"path": "x"}), &[]),
            step("s2", "insert_clip", refs.clone(), &[]),
        ]);
        let errors = messages(
            validator()
                .validate_candidate(&missing_dep, &EditingContext::new())
                .unwrap_err(),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("not listed in dependsOn"));

        let fixed = candidate(vec![
            step("s1", "import_asset", json!({"path": "x"}), &[]),
            step("s2", "insert_clip", refs, &["s1"]),
        ]);
        assert!(validator().validate_candidate(&fixed, &EditingContext::new()).is_ok());
    }

    #[test]
    fn test_reference_contract_violations() {
        let plan = candidate(vec![
            step("s1", "import_asset", json!({"path": "x"}), &[]),
            step(
                "s2",
                "insert_clip",
                json!({
                    "assetId": {"fromStep": "s1", "path": "internal.assetId"},
                    "trackId": {"fromStep": "s2", "path": "data.trackId"},
                    "at": {"fromStep": "ghost", "path": "data.at"}
                }),
                &["s1"],
            ),
        ]);
        let errors = messages(validator().validate_candidate(&plan, &EditingContext::new()).unwrap_err());
        let joined = errors.join("\n");
        assert!(joined.contains("must read from 'data'"));
        assert!(joined.contains("reads from the step itself"));
        assert!(joined.contains("targets unknown step 'ghost'"));
    }

    #[test]
    fn test_reference_must_target_earlier_step() {
        let refs = json!({"assetId": {"fromStep": "s2", "path": "data.assetId"}});
        let forward = candidate(vec![
            step("s1", "insert_clip", refs, &["s2"]),
            step("s2", "import_asset", json!({"path": "x"}), &[]),
        ]);
        let errors = messages(
            validator()
                .validate_candidate(&forward, &EditingContext::new())
                .unwrap_err(),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("reads from 's2', which comes later in the plan"));
    }

    #[test]
    fn test_cycle_detected() {
        let plan = candidate(vec![
            step("a", "import_asset", json!({"path": "a"}), &["c"]),
            step("b", "import_asset", json!({"path": "b"}), &["a"]),
            step("c", "import_asset", json!({"path": "c"}), &["b"]),
        ]);
        let errors = messages(validator().validate_candidate(&plan, &EditingContext::new()).unwrap_err());
        assert_eq!(errors, vec!["Circular dependency detected involving step 'a'"]);
    }

    #[test]
    fn test_unknown_and_self_dependencies() {
        let plan = candidate(vec![
            step("a", "import_asset", json!({"path": "a"}), &["a"]),
            step("b", "import_asset", json!({"path": "b"}), &["zzz"]),
        ]);
        let errors = messages(validator().validate_candidate(&plan, &EditingContext::new()).unwrap_err());
        assert_eq!(
            errors,
            vec![
                "step 'a' depends on itself",
                "step 'b' depends on unknown step 'zzz'"
            ]
        );
    }

    #[test]
    fn test_review_reports_warnings_and_estimate() {
        let catalog = ToolRegistry::from_definitions(vec![
            ToolDefinition::new("import_asset", "Import media"),
            ToolDefinition::new("delete_clip", "Delete a clip").with_risk_level(RiskLevel::High),
        ]);
        let validator = PlanValidator::new(Arc::new(catalog), ValidatorConfig::default());
        let mut steps = vec![
            step("s1", "import_asset", json!({}), &[]),
            step("s2", "delete_clip", json!({}), &[]),
        ];
        steps[0]["estimatedDuration"] = json!(1.5);
        steps[1]["estimatedDuration"] = json!(2);

        let review = validator
            .review_candidate(&candidate(steps), &EditingContext::new())
            .unwrap();

        assert_eq!(review.plan.len(), 2);
        assert_eq!(review.estimated_time_secs, 3.5);
        assert_eq!(review.warnings.len(), 1);
        assert_eq!(review.warnings[0].code, "RISK_UNDERSTATED");
        assert!(review.warnings[0].message.contains("step 's2' declares low risk"));
    }

    #[test]
    fn test_review_flags_high_risk_steps() {
        let mut risky = step("s1", "import_asset", json!({"path": "/a.mov"}), &[]);
        risky["riskLevel"] = json!("critical");

        let review = validator()
            .review_candidate(&candidate(vec![risky]), &EditingContext::new())
            .unwrap();

        let codes: Vec<_> = review.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["HIGH_RISK"]);
        assert_eq!(review.warnings[0].message, "plan contains high-risk steps: s1");
    }

    #[test]
    fn test_disabled_tool_is_rejected() {
        let mut catalog = ToolRegistry::from_definitions(vec![
            ToolDefinition::new("import_asset", "Import media"),
        ]);
        catalog.disable("import_asset");
        let validator = PlanValidator::new(Arc::new(catalog), ValidatorConfig::default());

        let errors = messages(
            validator
                .validate_candidate(
                    &candidate(vec![step("s1", "import_asset", json!({}), &[])]),
                    &EditingContext::new(),
                )
                .unwrap_err(),
        );
        assert_eq!(errors, vec!["step 's1': tool 'import_asset' is disabled"]);
    }

    #[test]
    fn test_catalog_port_is_consulted() {
        let mut catalog = MockCatalog::new();
        catalog.expect_has_tool().returning(|name| name == "export");
        catalog
            .expect_get_definition()
            .returning(|name| Some(ToolDefinition::new(name, "Export")));
        catalog
            .expect_validate_args()
            .times(1)
            .returning(|_, _| ArgValidation::invalid(vec!["format is required".to_string()]));

        let validator = PlanValidator::new(Arc::new(catalog), ValidatorConfig::default());
        let err = validator
            .validate_candidate(
                &candidate(vec![step("s1", "export", json!({}), &[])]),
                &EditingContext::new(),
            )
            .unwrap_err();
        assert_eq!(messages(err), vec!["step 's1' (export): format is required"]);
    }

    #[test]
    fn test_validate_typed_plan() {
        let plan = Plan::new("Import")
            .with_step(
                PlanStep::new("s1", "import_asset")
                    .with_args(json!({"path": "/a.mov"}))
                    .with_description("Import"),
            )
            .with_rollback("undo");
        assert!(validator().validate_plan(&plan, &EditingContext::new()).is_ok());
    }

    #[test]
    fn test_looks_like_placeholder() {
        for value in ["clip_from_catalog", "PLACEHOLDER", "<clip id>", "{{trackId}}", "${id}", "audio_2", "TBD", ""] {
            assert!(looks_like_placeholder(value), "{value}");
        }
        for value in ["a1", "clip_8f2c", "t1", "seq-main", "video-intro.mp4"] {
            assert!(!looks_like_placeholder(value), "{value}");
        }
    }
}
