//! Collaborator ports
//!
//! The language-model planner (or a deterministic playbook) and the user
//! approval flow live outside this crate; the orchestrator reaches them
//! through these traits.

use super::config::PlanRequest;
use crate::error::Result;
use crate::plan::Plan;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Produces candidate plans
#[async_trait::async_trait]
pub trait PlanProducer: Send + Sync {
    /// Producer name, for logs
    fn name(&self) -> &str;

    /// Return a candidate plan as raw JSON
    async fn produce(&self, request: &PlanRequest) -> Result<Value>;
}

/// Outcome of an approval review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Execute the plan
    Approved,
    /// Do not execute the plan
    Rejected {
        /// Why the plan was rejected
        reason: String,
    },
}

/// Asks a user to approve risky plans
#[async_trait::async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Review a validated plan
    async fn review(&self, plan: &Plan) -> Result<ApprovalDecision>;
}
