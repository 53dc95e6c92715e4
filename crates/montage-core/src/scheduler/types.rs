//! Execution records

use chrono::{DateTime, Utc};
use montage_tools::ToolOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to one attempted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecutionRecord {
    /// Step identifier
    pub step_id: String,
    /// Tool that was (or would have been) called
    pub tool: String,
    /// Arguments as resolved for the last attempt
    pub args: Value,
    /// Outcome of the last attempt
    pub result: ToolOutcome,
    /// When the first attempt started
    pub start_time: DateTime<Utc>,
    /// When the last attempt finished
    pub end_time: DateTime<Utc>,
    /// Retries made after the first attempt
    pub retry_count: u32,
    /// A transient failure used up every retry
    #[serde(default)]
    pub retries_exhausted: bool,
}

impl StepExecutionRecord {
    /// Whether the step succeeded
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result.success
    }

    /// Error message of the last attempt, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.result.error.as_deref()
    }
}

/// Everything one scheduler run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// No failed steps and not aborted
    pub success: bool,
    /// Completed steps in completion order
    pub completed_steps: Vec<StepExecutionRecord>,
    /// Failed steps in failure order
    pub failed_steps: Vec<StepExecutionRecord>,
    /// Wall-clock duration of the run in milliseconds
    #[serde(rename = "totalDuration")]
    pub total_duration_ms: u64,
    /// The run was cancelled
    pub aborted: bool,
    /// Tool invocations made, retries included
    pub tool_calls_used: usize,
}

impl ExecutionResult {
    /// Assemble a result, deriving `success`
    #[must_use]
    pub fn new(
        completed_steps: Vec<StepExecutionRecord>,
        failed_steps: Vec<StepExecutionRecord>,
        total_duration_ms: u64,
        aborted: bool,
        tool_calls_used: usize,
    ) -> Self {
        Self {
            success: failed_steps.is_empty() && !aborted,
            completed_steps,
            failed_steps,
            total_duration_ms,
            aborted,
            tool_calls_used,
        }
    }

    /// Record of a completed step
    #[must_use]
    pub fn completed(&self, step_id: &str) -> Option<&StepExecutionRecord> {
        self.completed_steps.iter().find(|r| r.step_id == step_id)
    }

    /// Record of a failed step
    #[must_use]
    pub fn failed(&self, step_id: &str) -> Option<&StepExecutionRecord> {
        self.failed_steps.iter().find(|r| r.step_id == step_id)
    }
}
