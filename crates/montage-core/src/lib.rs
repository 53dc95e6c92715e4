//! Montage Core - Plan Orchestration Engine
//!
//! This crate provides the orchestration core for the Montage editing agent,
//! including:
//! - Plans: The step/plan data model and step-to-step value references
//! - Validation: Turning raw producer output into a safe, typed plan
//! - Scheduling: Running plans with retries, timeouts and call budgets
//! - Failure heuristics: Deciding when another planning cycle is pointless
//! - Orchestration: Produce/validate/approve/execute cycles per intent
//! - Errors: The agent error taxonomy shared by every phase

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod failure;
pub mod iteration;
pub mod orchestrator;
pub mod plan;
pub mod references;
pub mod scheduler;
pub mod validator;

pub use self::config::MontageConfig;
pub use error::{
    classify_recoverable, timeout_for, wrap, AgentError, AgentErrorKind, AgentPhase, Result,
    UserFriendlyError,
};
pub use failure::{
    detect_immediate_terminal_failure, detect_repeated_terminal_failure, failure_signature,
    TerminalGuidance,
};
pub use iteration::{IterationController, IterationVerdict};
pub use orchestrator::{
    ApprovalDecision, ApprovalGate, Orchestrator, OrchestratorSettings, PlanProducer, PlanRequest,
    RunOutcome,
};
pub use plan::{Plan, PlanStep};
pub use references::StepValueReference;
pub use scheduler::{
    execution_order, DoomLoopDetector, ExecutionResult, ExecutorConfig, PlanExecutor,
    ProgressBus, ProgressEvent, ProgressObserver, StepExecutionRecord,
};
pub use validator::{PlanReview, PlanValidator, ValidationWarning, ValidatorConfig};
