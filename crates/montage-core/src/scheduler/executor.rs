//! Plan executor
//!
//! Runs a validated plan against a [`ToolExecutor`], one step at a time or in
//! dependency batches. All bookkeeping lives in a per-run [`RunState`].

use super::config::ExecutorConfig;
use super::doom_loop::DoomLoopDetector;
use super::order::execution_order;
use super::progress::{ProgressEvent, ProgressObserver};
use super::types::{ExecutionResult, StepExecutionRecord};
use crate::error::{AgentError, AgentErrorKind, Result};
use crate::failure::is_transient;
use crate::plan::{Plan, PlanStep};
use crate::references::{self, PathLookup};
use chrono::{DateTime, Utc};
use montage_tools::{EditingContext, ToolExecutor, ToolOutcome};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of one tool invocation attempt
enum Invocation {
    Done(ToolOutcome),
    Failed(montage_tools::Error),
    TimedOut,
    Cancelled,
}

/// What a step needs before its first attempt
enum Prepared {
    /// Settled without calling the tool (skipped or unresolvable)
    Settled(StepExecutionRecord),
    /// Ready to call with resolved arguments
    Run(Value),
}

/// Per-run bookkeeping
struct RunState<'a> {
    started: Instant,
    completed: Vec<StepExecutionRecord>,
    failed: Vec<StepExecutionRecord>,
    completed_ids: HashSet<String>,
    failed_ids: HashSet<String>,
    outputs: HashMap<String, Value>,
    tool_calls: usize,
    max_tool_calls: usize,
    doom: DoomLoopDetector,
    observer: Option<&'a dyn ProgressObserver>,
}

impl<'a> RunState<'a> {
    fn new(config: &ExecutorConfig, observer: Option<&'a dyn ProgressObserver>) -> Self {
        Self {
            started: Instant::now(),
            completed: Vec::new(),
            failed: Vec::new(),
            completed_ids: HashSet::new(),
            failed_ids: HashSet::new(),
            outputs: HashMap::new(),
            tool_calls: 0,
            max_tool_calls: config.max_tool_calls,
            doom: DoomLoopDetector::new(config.doom_loop_threshold),
            observer,
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(observer) = self.observer {
            observer.on_event(&event);
        }
    }

    fn is_settled(&self, step_id: &str) -> bool {
        self.completed_ids.contains(step_id) || self.failed_ids.contains(step_id)
    }

    /// Count an invocation against the loop detector and the budget
    fn admit(&mut self, step: &PlanStep, args: &Value) -> Result<()> {
        if let Some(repetitions) = self.doom.check(&step.tool, args) {
            warn!(step_id = %step.id, tool = %step.tool, repetitions, "Doom loop detected");
            return Err(AgentError::new(AgentErrorKind::DoomLoopDetected {
                tool: step.tool.clone(),
                repetitions,
            }));
        }
        if self.tool_calls >= self.max_tool_calls {
            warn!(step_id = %step.id, tool = %step.tool, limit = self.max_tool_calls, "Tool call budget exhausted");
            return Err(AgentError::new(AgentErrorKind::ToolBudgetExceeded {
                limit: self.max_tool_calls,
                used: self.tool_calls,
                step_id: Some(step.id.clone()),
                tool: Some(step.tool.clone()),
            }));
        }
        self.doom.record(&step.tool, args);
        self.tool_calls += 1;
        Ok(())
    }

    fn finish(&mut self, record: StepExecutionRecord) {
        if record.succeeded() {
            debug!(step_id = %record.step_id, retry_count = record.retry_count, "Step completed");
            self.emit(ProgressEvent::StepCompleted {
                step_id: record.step_id.clone(),
                duration_ms: record.result.duration_ms,
                retry_count: record.retry_count,
            });
            let data = record.result.data.clone().unwrap_or(Value::Null);
            self.outputs.insert(record.step_id.clone(), json!({ "data": data }));
            self.completed_ids.insert(record.step_id.clone());
            self.completed.push(record);
        } else {
            let error = record.error().unwrap_or_default().to_string();
            warn!(step_id = %record.step_id, tool = %record.tool, error = %error, "Step failed");
            self.emit(ProgressEvent::StepFailed {
                step_id: record.step_id.clone(),
                error,
                retry_count: record.retry_count,
            });
            self.failed_ids.insert(record.step_id.clone());
            self.failed.push(record);
        }
    }

    fn snapshot(&self, aborted: bool) -> ExecutionResult {
        ExecutionResult::new(
            self.completed.clone(),
            self.failed.clone(),
            self.started.elapsed().as_millis() as u64,
            aborted,
            self.tool_calls,
        )
    }

    fn abort(&self) -> AgentError {
        info!(
            completed = self.completed.len(),
            failed = self.failed.len(),
            "Execution aborted"
        );
        self.emit(ProgressEvent::Aborted {
            completed_steps: self.completed.len(),
            failed_steps: self.failed.len(),
        });
        AgentError::new(AgentErrorKind::SessionAborted {
            reason: "execution cancelled".to_string(),
        })
        .with_partial_result(self.snapshot(true))
    }
}

fn settled_record(
    step: &PlanStep,
    args: Value,
    result: ToolOutcome,
    start_time: DateTime<Utc>,
    retry_count: u32,
    retries_exhausted: bool,
) -> StepExecutionRecord {
    StepExecutionRecord {
        step_id: step.id.clone(),
        tool: step.tool.clone(),
        args,
        result,
        start_time,
        end_time: Utc::now(),
        retry_count,
        retries_exhausted,
    }
}

/// Executes validated plans
#[derive(Clone)]
pub struct PlanExecutor {
    tools: Arc<dyn ToolExecutor>,
    config: ExecutorConfig,
}

impl PlanExecutor {
    /// Create an executor over a tool backend
    #[must_use]
    pub fn new(tools: Arc<dyn ToolExecutor>, config: ExecutorConfig) -> Self {
        Self { tools, config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run every step of `plan`.
    ///
    /// Errors raised after the run starts carry the partial result;
    /// cancellation surfaces as a session-aborted error.
    #[instrument(skip_all, fields(goal = %plan.goal, steps = plan.steps.len()))]
    pub async fn execute(
        &self,
        plan: &Plan,
        context: &EditingContext,
        cancel: &CancellationToken,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<ExecutionResult> {
        if plan.steps.len() > self.config.max_steps {
            return Err(AgentError::new(AgentErrorKind::StepBudgetExceeded {
                limit: self.config.max_steps,
                requested: plan.steps.len(),
            }));
        }
        let order = execution_order(plan)?;

        let mut state = RunState::new(&self.config, observer);
        state.emit(ProgressEvent::Started {
            total_steps: plan.steps.len(),
        });
        info!(parallel = self.config.parallel, "Execution started");

        let outcome = if self.config.parallel {
            self.run_batches(&order, &mut state, context, cancel).await
        } else {
            self.run_sequential(&order, &mut state, context, cancel).await
        };

        match outcome {
            Err(err) => {
                if err.partial_result().is_some() {
                    return Err(err);
                }
                Err(err.with_partial_result(state.snapshot(cancel.is_cancelled())))
            }
            Ok(()) if cancel.is_cancelled() => Err(state.abort()),
            Ok(()) => {
                let result = state.snapshot(false);
                info!(
                    success = result.success,
                    completed = result.completed_steps.len(),
                    failed = result.failed_steps.len(),
                    tool_calls = result.tool_calls_used,
                    duration_ms = result.total_duration_ms,
                    "Execution finished"
                );
                state.emit(ProgressEvent::Completed {
                    success: result.success,
                    duration_ms: result.total_duration_ms,
                });
                Ok(result)
            }
        }
    }

    async fn run_sequential(
        &self,
        order: &[&PlanStep],
        state: &mut RunState<'_>,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for step in order {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let record = match self.prepare(step, state)? {
                Prepared::Settled(record) => record,
                Prepared::Run(args) => {
                    let start_time = Utc::now();
                    state.admit(step, &args)?;
                    state.emit(ProgressEvent::StepStarted {
                        step_id: step.id.clone(),
                        tool: step.tool.clone(),
                    });
                    let invocation = self.invoke(step, args.clone(), context, cancel).await;
                    match self
                        .settle(step, args, start_time, invocation, state, context, cancel)
                        .await?
                    {
                        Some(record) => record,
                        None => return Ok(()),
                    }
                }
            };
            let failed = !record.succeeded();
            state.finish(record);
            if failed && self.config.stop_on_error {
                info!(step_id = %step.id, "Stopping after failed step");
                return Ok(());
            }
        }
        Ok(())
    }

    async fn run_batches(
        &self,
        order: &[&PlanStep],
        state: &mut RunState<'_>,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut pending: Vec<&PlanStep> = order.to_vec();

        while !pending.is_empty() {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let (ready, waiting): (Vec<&PlanStep>, Vec<&PlanStep>) = pending
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| state.is_settled(d)));
            pending = waiting;
            if ready.is_empty() {
                let stuck = pending[0];
                return Err(AgentError::new(AgentErrorKind::DependencyUnsatisfied {
                    step_id: stuck.id.clone(),
                    missing: stuck
                        .depends_on
                        .iter()
                        .filter(|d| !state.is_settled(d))
                        .cloned()
                        .collect(),
                }));
            }
            debug!(batch = ready.len(), "Running batch");

            // admit first attempts in plan order
            let mut prepared = Vec::with_capacity(ready.len());
            for step in &ready {
                let item = match self.prepare(step, state)? {
                    Prepared::Run(args) => {
                        state.admit(step, &args)?;
                        state.emit(ProgressEvent::StepStarted {
                            step_id: step.id.clone(),
                            tool: step.tool.clone(),
                        });
                        Prepared::Run(args)
                    }
                    settled => settled,
                };
                prepared.push((*step, item, Utc::now()));
            }

            let calls = prepared.iter().filter_map(|(step, item, _)| match item {
                Prepared::Run(args) => Some(self.invoke(step, args.clone(), context, cancel)),
                Prepared::Settled(_) => None,
            });
            let mut invocations = futures::future::join_all(calls).await.into_iter();

            // flush in plan order; retries run one after another
            let mut batch_failed = false;
            for (step, item, start_time) in prepared {
                let record = match item {
                    Prepared::Settled(record) => record,
                    Prepared::Run(args) => {
                        let invocation = invocations.next().unwrap_or(Invocation::Cancelled);
                        match self
                            .settle(step, args, start_time, invocation, state, context, cancel)
                            .await?
                        {
                            Some(record) => record,
                            None => return Ok(()),
                        }
                    }
                };
                batch_failed |= !record.succeeded();
                state.finish(record);
            }
            if batch_failed && self.config.stop_on_error {
                info!("Stopping after failed batch");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Dependency check and reference resolution
    fn prepare(&self, step: &PlanStep, state: &RunState<'_>) -> Result<Prepared> {
        let missing: Vec<String> = step
            .depends_on
            .iter()
            .filter(|d| !state.completed_ids.contains(d.as_str()))
            .cloned()
            .collect();
        if let Some(failed_dep) = missing.iter().find(|d| state.failed_ids.contains(d.as_str())) {
            debug!(step_id = %step.id, dependency = %failed_dep, "Skipping step");
            return Ok(Prepared::Settled(settled_record(
                step,
                step.args.clone(),
                ToolOutcome::failure(format!("skipped: dependency '{}' failed", failed_dep), 0),
                Utc::now(),
                0,
                false,
            )));
        }
        if !missing.is_empty() {
            return Err(AgentError::new(AgentErrorKind::DependencyUnsatisfied {
                step_id: step.id.clone(),
                missing,
            }));
        }

        let resolved = references::resolve(&step.args, |reference| {
            match state.outputs.get(&reference.from_step) {
                Some(root) => references::get_at_path(root, &reference.path),
                None => PathLookup::NotFound {
                    reason: format!("step '{}' has no recorded output", reference.from_step),
                },
            }
        });
        if !resolved.is_complete() {
            let detail = resolved
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.path, f.reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Ok(Prepared::Settled(settled_record(
                step,
                resolved.args,
                ToolOutcome::failure(format!("unresolved step references: {}", detail), 0),
                Utc::now(),
                0,
                false,
            )));
        }
        Ok(Prepared::Run(resolved.args))
    }

    /// One attempt under the step timeout, abandoned on cancellation
    async fn invoke(
        &self,
        step: &PlanStep,
        args: Value,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Invocation {
        let call = self.tools.execute(&step.tool, args, context);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Invocation::Cancelled,
            res = tokio::time::timeout(self.config.step_timeout(), call) => match res {
                Ok(Ok(outcome)) => Invocation::Done(outcome),
                Ok(Err(e)) => Invocation::Failed(e),
                Err(_) => Invocation::TimedOut,
            },
        }
    }

    /// Turn an attempt into a record, retrying transient failures.
    ///
    /// `None` means the run was cancelled and the step is discarded.
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        step: &PlanStep,
        args: Value,
        start_time: DateTime<Utc>,
        mut invocation: Invocation,
        state: &mut RunState<'_>,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<Option<StepExecutionRecord>> {
        let mut attempt: u32 = 0;
        loop {
            let mut outcome = match invocation {
                Invocation::Cancelled => return Ok(None),
                Invocation::TimedOut => {
                    let timeout_ms = self.config.step_timeout_ms;
                    let err = AgentError::new(AgentErrorKind::ExecutionTimeout {
                        timeout_ms,
                        step_id: Some(step.id.clone()),
                    });
                    warn!(step_id = %step.id, tool = %step.tool, timeout_ms, "Step timed out");
                    return Ok(Some(settled_record(
                        step,
                        args,
                        ToolOutcome::failure(err.to_string(), timeout_ms),
                        start_time,
                        attempt,
                        false,
                    )));
                }
                Invocation::Failed(montage_tools::Error::NotFound(tool)) => {
                    return Err(AgentError::new(AgentErrorKind::ToolNotFound { tool }));
                }
                Invocation::Failed(e) => ToolOutcome::failure(e.to_string(), 0),
                Invocation::Done(outcome) => outcome,
            };

            if outcome.success {
                return Ok(Some(settled_record(step, args, outcome, start_time, attempt, false)));
            }

            let message = outcome
                .error
                .get_or_insert_with(|| "tool reported failure without an error message".to_string())
                .clone();
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let transient = is_transient(&message);
            if !transient || attempt >= self.config.max_retries {
                return Ok(Some(settled_record(
                    step, args, outcome, start_time, attempt, transient,
                )));
            }

            attempt += 1;
            let delay = self.config.retry_delay(attempt);
            warn!(
                step_id = %step.id,
                tool = %step.tool,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %message,
                "Transient failure, retrying"
            );
            state.emit(ProgressEvent::StepRetrying {
                step_id: step.id.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                error: message,
            });
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
            state.admit(step, &args)?;
            invocation = self.invoke(step, args.clone(), context, cancel).await;
        }
    }
}
