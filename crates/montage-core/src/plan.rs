//! Plan data model
//!
//! A [`Plan`] is what a producer emits for one planning cycle. It is
//! validated once and then only read.

use montage_tools::RiskLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation inside a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// Unique within the plan
    pub id: String,
    /// Tool name, resolved against the catalog
    pub tool: String,
    /// Keyed arguments; values may embed step references
    pub args: Value,
    /// What the step does
    pub description: String,
    /// Risk of the step
    pub risk_level: RiskLevel,
    /// Estimated duration in seconds
    pub estimated_duration: f64,
    /// Steps that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl PlanStep {
    /// Create a step with empty args and low risk
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            args: Value::Object(serde_json::Map::new()),
            description: String::new(),
            risk_level: RiskLevel::Low,
            estimated_duration: 0.0,
            depends_on: Vec::new(),
        }
    }

    /// Set the arguments
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the risk level
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Add a dependency
    #[must_use]
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }
}

/// An ordered set of steps with a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// What the plan achieves
    pub goal: String,
    /// Steps in authored order
    pub steps: Vec<PlanStep>,
    /// Estimated total duration in seconds
    pub estimated_total_duration: f64,
    /// Whether a user must approve before execution
    pub requires_approval: bool,
    /// How to undo the plan
    pub rollback_strategy: String,
}

impl Plan {
    /// Create an empty plan
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            steps: Vec::new(),
            estimated_total_duration: 0.0,
            requires_approval: false,
            rollback_strategy: String::new(),
        }
    }

    /// Append a step
    #[must_use]
    pub fn with_step(mut self, step: PlanStep) -> Self {
        self.estimated_total_duration += step.estimated_duration;
        self.steps.push(step);
        self
    }

    /// Mark the plan as needing approval
    #[must_use]
    pub fn with_approval(mut self, required: bool) -> Self {
        self.requires_approval = required;
        self
    }

    /// Set the rollback strategy
    #[must_use]
    pub fn with_rollback(mut self, strategy: impl Into<String>) -> Self {
        self.rollback_strategy = strategy.into();
        self
    }

    /// Look up a step by id
    #[must_use]
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Highest risk level across all steps
    #[must_use]
    pub fn max_risk(&self) -> Option<RiskLevel> {
        self.steps.iter().map(|s| s.risk_level).max()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_producer_json() {
        let plan: Plan = serde_json::from_value(json!({
            "goal": "Trim intro",
            "steps": [{
                "id": "s1",
                "tool": "trim_clip",
                "args": {"clipId": "c1", "start": 0.5},
                "description": "Trim the first clip",
                "riskLevel": "medium",
                "estimatedDuration": 2
            }],
            "estimatedTotalDuration": 2,
            "requiresApproval": false,
            "rollbackStrategy": "undo"
        }))
        .unwrap();

        assert_eq!(plan.len(), 1);
        let step = plan.step("s1").unwrap();
        assert_eq!(step.risk_level, RiskLevel::Medium);
        assert!(step.depends_on.is_empty());
        assert_eq!(step.args["clipId"], "c1");
    }

    #[test]
    fn test_builder_and_max_risk() {
        let plan = Plan::new("Cut")
            .with_step(PlanStep::new("a", "split_clip"))
            .with_step(
                PlanStep::new("b", "delete_clip")
                    .with_risk_level(RiskLevel::High)
                    .depends_on("a"),
            )
            .with_rollback("undo twice");

        assert_eq!(plan.max_risk(), Some(RiskLevel::High));
        assert_eq!(plan.step("b").unwrap().depends_on, vec!["a"]);
        assert!(plan.step("c").is_none());
        assert_eq!(Plan::new("empty").max_risk(), None);

        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["rollbackStrategy"], "undo twice");
        assert_eq!(value["steps"][1]["dependsOn"][0], "a");
    }
}
