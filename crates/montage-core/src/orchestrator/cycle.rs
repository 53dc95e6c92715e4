//! Planning cycles
//!
//! One cycle is produce → validate → (approve) → execute. `run` repeats
//! cycles under the iteration controller, feeding each failure back to the
//! producer.

use super::config::PlanRequest;
use super::core::Orchestrator;
use super::ports::ApprovalDecision;
use crate::error::{timeout_for, wrap, AgentError, AgentErrorKind, AgentPhase, Result};
use crate::failure::TerminalGuidance;
use crate::iteration::{IterationController, IterationVerdict};
use crate::plan::Plan;
use crate::scheduler::ExecutionResult;
use montage_tools::EditingContext;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Final outcome of [`Orchestrator::run`]
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Result of the last cycle
    pub result: ExecutionResult,
    /// Cycles started
    pub iterations: usize,
    /// Set when the loop stopped on a terminal failure
    pub guidance: Option<TerminalGuidance>,
}

impl RunOutcome {
    /// Whether the last cycle succeeded
    #[must_use]
    pub fn success(&self) -> bool {
        self.result.success
    }
}

fn aborted(phase: AgentPhase) -> AgentError {
    AgentError::new(AgentErrorKind::SessionAborted {
        reason: format!("cancelled while {}", phase),
    })
    .in_phase(phase)
}

impl Orchestrator {
    /// Run a single cycle for `intent`
    pub async fn run_cycle(
        &self,
        intent: &str,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let session = self.claim_session(context, cancel)?;
        let request = PlanRequest::new(intent, context.clone());
        self.cycle(&request, session.token()).await
    }

    /// Repeat cycles until the intent succeeds, stops on a terminal failure,
    /// or the iteration cap is hit.
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4(), producer = %self.producer.name()))]
    pub async fn run(
        &self,
        intent: &str,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let session = self.claim_session(context, cancel)?;
        let mut controller = IterationController::new(self.settings.max_iterations);
        let mut request = PlanRequest::new(intent, context.clone());

        loop {
            request.iteration = controller.begin_iteration()?;
            match self.cycle(&request, session.token()).await {
                Ok(result) => match controller.observe(&result) {
                    IterationVerdict::Done => {
                        info!(iterations = controller.iteration(), "Intent completed");
                        return Ok(RunOutcome {
                            result,
                            iterations: controller.iteration(),
                            guidance: None,
                        });
                    }
                    IterationVerdict::Stop(guidance) => {
                        return Ok(RunOutcome {
                            result,
                            iterations: controller.iteration(),
                            guidance: Some(guidance),
                        });
                    }
                    IterationVerdict::Continue => {
                        request.previous_error = None;
                        request.previous_result = Some(result);
                    }
                },
                Err(err) if err.recoverable() => {
                    warn!(code = err.code(), error = %err, iteration = request.iteration, "Cycle failed, re-planning");
                    request.previous_error = Some(err.to_string());
                    request.previous_result = err.into_partial_result();
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn cycle(&self, request: &PlanRequest, cancel: &CancellationToken) -> Result<ExecutionResult> {
        let candidate = self.produce(request, cancel).await?;
        let plan = self
            .validator
            .review_candidate(&candidate, &request.context)?
            .plan;

        let needs_approval = plan.requires_approval
            || plan
                .max_risk()
                .is_some_and(|risk| risk >= self.settings.approval_risk_threshold);
        if needs_approval {
            self.approve(&plan, cancel).await?;
        }

        self.executor
            .execute(&plan, &request.context, cancel, self.observer.as_deref())
            .await
    }

    async fn produce(&self, request: &PlanRequest, cancel: &CancellationToken) -> Result<serde_json::Value> {
        let timeout = self.settings.planning_timeout();
        let produced = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(aborted(AgentPhase::Planning)),
            res = tokio::time::timeout(timeout, self.producer.produce(request)) => res,
        };
        match produced {
            Err(_) => {
                warn!(timeout_ms = self.settings.planning_timeout_ms, "Plan producer timed out");
                Err(timeout_for(AgentPhase::Planning, self.settings.planning_timeout_ms))
            }
            Ok(Err(err)) => Err(wrap(err, AgentPhase::Planning)),
            Ok(Ok(candidate)) => Ok(candidate),
        }
    }

    async fn approve(&self, plan: &Plan, cancel: &CancellationToken) -> Result<()> {
        let Some(gate) = &self.approval_gate else {
            return Err(AgentError::new(AgentErrorKind::ApprovalRejected {
                reason: "no approval gate configured".to_string(),
            }));
        };
        info!(steps = plan.steps.len(), "Waiting for plan approval");

        let reviewed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(aborted(AgentPhase::AwaitingApproval)),
            res = tokio::time::timeout(self.settings.approval_timeout(), gate.review(plan)) => res,
        };
        match reviewed {
            Err(_) => Err(timeout_for(
                AgentPhase::AwaitingApproval,
                self.settings.approval_timeout_ms,
            )),
            Ok(Err(err)) => Err(wrap(err, AgentPhase::AwaitingApproval)),
            Ok(Ok(ApprovalDecision::Approved)) => Ok(()),
            Ok(Ok(ApprovalDecision::Rejected { reason })) => {
                info!(reason = %reason, "Plan rejected");
                Err(AgentError::new(AgentErrorKind::ApprovalRejected { reason }))
            }
        }
    }
}
