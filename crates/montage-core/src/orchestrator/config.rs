//! Orchestrator configuration
//!
//! Contains the settings for the planning cycle and the request type handed
//! to plan producers.

use crate::scheduler::ExecutionResult;
use montage_tools::{EditingContext, RiskLevel};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for planning cycles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Plan/execute cycles allowed per request
    pub max_iterations: usize,
    /// Time allowed for the producer, in milliseconds
    pub planning_timeout_ms: u64,
    /// Time allowed for an approval decision, in milliseconds
    pub approval_timeout_ms: u64,
    /// Plans with a step at or above this risk need approval
    pub approval_risk_threshold: RiskLevel,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            planning_timeout_ms: 60_000,
            approval_timeout_ms: 300_000,
            approval_risk_threshold: RiskLevel::High,
        }
    }
}

impl OrchestratorSettings {
    /// Set the iteration cap
    #[must_use]
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the planning timeout
    #[must_use]
    pub fn with_planning_timeout(mut self, timeout: Duration) -> Self {
        self.planning_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the approval timeout
    #[must_use]
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the approval risk threshold
    #[must_use]
    pub fn with_approval_threshold(mut self, level: RiskLevel) -> Self {
        self.approval_risk_threshold = level;
        self
    }

    /// Planning timeout as a duration
    #[must_use]
    pub fn planning_timeout(&self) -> Duration {
        Duration::from_millis(self.planning_timeout_ms)
    }

    /// Approval timeout as a duration
    #[must_use]
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }
}

/// What a plan producer is asked for
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// The user's intent
    pub intent: String,
    /// Current editing state
    pub context: EditingContext,
    /// 1-based cycle number
    pub iteration: usize,
    /// Result of the previous cycle, if it ran
    pub previous_result: Option<ExecutionResult>,
    /// Error of the previous cycle, if it failed
    pub previous_error: Option<String>,
}

impl PlanRequest {
    /// Create a first-cycle request
    pub fn new(intent: impl Into<String>, context: EditingContext) -> Self {
        Self {
            intent: intent.into(),
            context,
            iteration: 1,
            previous_result: None,
            previous_error: None,
        }
    }

    /// Whether this is a re-plan after a failed cycle
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.previous_result.is_some() || self.previous_error.is_some()
    }
}
