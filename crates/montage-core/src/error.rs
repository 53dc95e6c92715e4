//! Error types for montage-core
//!
//! Every failure that crosses the agent pipeline is an [`AgentError`]: a
//! kind-specific payload ([`AgentErrorKind`]) plus the metadata the
//! iteration logic needs to decide what happens next (phase,
//! recoverability, timestamp and, for scheduler failures, the partial
//! execution result).

use crate::scheduler::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Phase of the agent loop an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// No cycle running
    Idle,
    /// Understanding the intent
    Thinking,
    /// Producing a plan
    Planning,
    /// Waiting on the user to approve a plan
    AwaitingApproval,
    /// Running plan steps
    Executing,
    /// Summarizing results
    Observing,
}

impl AgentPhase {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Planning => "planning",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Executing => "executing",
            Self::Observing => "observing",
        }
    }
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific error payloads
#[derive(Debug, Clone, Error, Serialize)]
#[serde(
    tag = "kind",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum AgentErrorKind {
    /// Invalid or missing configuration
    #[error("configuration error: {reason}")]
    Configuration {
        /// What is wrong
        reason: String,
    },

    /// A cycle is already running for the session
    #[error("session '{session_id}' already has an active cycle")]
    SessionActive {
        /// Session identifier
        session_id: String,
    },

    /// The session was cancelled
    #[error("session aborted: {reason}")]
    SessionAborted {
        /// Why it was aborted
        reason: String,
    },

    /// Intent understanding took too long
    #[error("thinking timed out after {timeout_ms}ms")]
    ThinkingTimeout {
        /// Limit that fired
        timeout_ms: u64,
    },

    /// Plan production took too long
    #[error("planning timed out after {timeout_ms}ms")]
    PlanningTimeout {
        /// Limit that fired
        timeout_ms: u64,
    },

    /// No approval decision in time
    #[error("approval timed out after {timeout_ms}ms")]
    ApprovalTimeout {
        /// Limit that fired
        timeout_ms: u64,
    },

    /// Observation took too long
    #[error("observation timed out after {timeout_ms}ms")]
    ObservationTimeout {
        /// Limit that fired
        timeout_ms: u64,
    },

    /// A step or the execution phase took too long
    #[error(
        "execution timed out after {timeout_ms}ms{}",
        .step_id.as_ref().map(|s| format!(" (step '{s}')")).unwrap_or_default()
    )]
    ExecutionTimeout {
        /// Limit that fired
        timeout_ms: u64,
        /// Step that was running, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
    },

    /// The intent could not be understood
    #[error("could not understand request: {reason}")]
    UnderstandingFailed {
        /// Explanation
        reason: String,
    },

    /// The producer failed to return a plan
    #[error("plan generation failed: {reason}")]
    PlanGenerationFailed {
        /// Explanation
        reason: String,
    },

    /// The candidate plan was rejected
    #[error("plan validation failed: {}", .validation_errors.join("; "))]
    PlanValidationFailed {
        /// Every accumulated validation message
        validation_errors: Vec<String>,
    },

    /// A tool name is not in the catalog
    #[error("tool not found: {tool}")]
    ToolNotFound {
        /// Requested tool
        tool: String,
    },

    /// The user rejected the plan
    #[error("plan rejected: {reason}")]
    ApprovalRejected {
        /// Rejection reason
        reason: String,
    },

    /// A tool call failed
    #[error("step '{step_id}' ({tool}) failed: {tool_error}")]
    ToolExecutionFailed {
        /// Failing step
        step_id: String,
        /// Tool that was called
        tool: String,
        /// Raw tool error
        tool_error: String,
    },

    /// Arguments rejected by a tool
    #[error("invalid arguments for {tool}: {}", .errors.join("; "))]
    InvalidArguments {
        /// Tool name
        tool: String,
        /// Schema messages
        errors: Vec<String>,
    },

    /// A step's dependencies did not complete
    #[error("step '{step_id}' has unsatisfied dependencies: {}", .missing.join(", "))]
    DependencyUnsatisfied {
        /// Step that cannot run
        step_id: String,
        /// Dependencies that are not completed
        missing: Vec<String>,
    },

    /// The plan has more steps than allowed
    #[error("plan has {requested} steps, limit is {limit}")]
    StepBudgetExceeded {
        /// Configured maximum
        limit: usize,
        /// Steps in the plan
        requested: usize,
    },

    /// Too many tool invocations in one run
    #[error(
        "tool call budget of {limit} exhausted{}",
        .step_id.as_ref().map(|s| format!(" at step '{s}'")).unwrap_or_default()
    )]
    ToolBudgetExceeded {
        /// Configured maximum
        limit: usize,
        /// Calls already made
        used: usize,
        /// Step that wanted another call
        #[serde(skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        /// Tool that step would have called
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
    },

    /// Identical tool calls repeated back to back
    #[error("doom loop detected: {tool} called {repetitions} times with identical arguments")]
    DoomLoopDetected {
        /// Repeated tool
        tool: String,
        /// Consecutive identical calls
        repetitions: usize,
    },

    /// The agent loop ran out of iterations
    #[error("maximum iterations ({max_iterations}) exceeded")]
    MaxIterationsExceeded {
        /// Configured maximum
        max_iterations: usize,
    },

    /// Generic language-model provider failure
    #[error("llm error from {provider}: {detail}")]
    Llm {
        /// Provider name
        provider: String,
        /// HTTP status, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        /// Provider message
        detail: String,
    },

    /// Provider rate limit
    #[error("llm rate limit from {provider}")]
    LlmRateLimited {
        /// Provider name
        provider: String,
        /// Suggested wait
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },

    /// Provider rejected credentials
    #[error("llm authentication failed for {provider}")]
    LlmAuthentication {
        /// Provider name
        provider: String,
    },

    /// The editing context cannot be used
    #[error("invalid editing context: {reason}")]
    ContextInvalid {
        /// Explanation
        reason: String,
    },

    /// A foreign error boxed into the taxonomy
    #[error("{message}")]
    Unhandled {
        /// Original message
        message: String,
        /// Original type name, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        original_kind: Option<String>,
    },
}

impl AgentErrorKind {
    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::SessionActive { .. } => "SESSION_ACTIVE",
            Self::SessionAborted { .. } => "SESSION_ABORTED",
            Self::ThinkingTimeout { .. } => "THINKING_TIMEOUT",
            Self::PlanningTimeout { .. } => "PLANNING_TIMEOUT",
            Self::ApprovalTimeout { .. } => "APPROVAL_TIMEOUT",
            Self::ObservationTimeout { .. } => "OBSERVATION_TIMEOUT",
            Self::ExecutionTimeout { .. } => "EXECUTION_TIMEOUT",
            Self::UnderstandingFailed { .. } => "UNDERSTANDING_FAILED",
            Self::PlanGenerationFailed { .. } => "PLAN_GENERATION_FAILED",
            Self::PlanValidationFailed { .. } => "PLAN_VALIDATION_FAILED",
            Self::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            Self::ApprovalRejected { .. } => "APPROVAL_REJECTED",
            Self::ToolExecutionFailed { .. } => "TOOL_EXECUTION_FAILED",
            Self::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            Self::DependencyUnsatisfied { .. } => "DEPENDENCY_UNSATISFIED",
            Self::StepBudgetExceeded { .. } => "STEP_BUDGET_EXCEEDED",
            Self::ToolBudgetExceeded { .. } => "TOOL_BUDGET_EXCEEDED",
            Self::DoomLoopDetected { .. } => "DOOM_LOOP_DETECTED",
            Self::MaxIterationsExceeded { .. } => "MAX_ITERATIONS_EXCEEDED",
            Self::Llm { .. } => "LLM_ERROR",
            Self::LlmRateLimited { .. } => "LLM_RATE_LIMITED",
            Self::LlmAuthentication { .. } => "LLM_AUTHENTICATION_FAILED",
            Self::ContextInvalid { .. } => "CONTEXT_INVALID",
            Self::Unhandled { .. } => "UNHANDLED_ERROR",
        }
    }

    /// Phase this kind is raised in unless the caller says otherwise
    #[must_use]
    pub fn default_phase(&self) -> AgentPhase {
        match self {
            Self::Configuration { .. }
            | Self::SessionActive { .. }
            | Self::ContextInvalid { .. }
            | Self::Unhandled { .. } => AgentPhase::Idle,
            Self::ThinkingTimeout { .. }
            | Self::UnderstandingFailed { .. }
            | Self::Llm { .. }
            | Self::LlmRateLimited { .. }
            | Self::LlmAuthentication { .. } => AgentPhase::Thinking,
            Self::PlanningTimeout { .. }
            | Self::PlanGenerationFailed { .. }
            | Self::PlanValidationFailed { .. } => AgentPhase::Planning,
            Self::ApprovalTimeout { .. } | Self::ApprovalRejected { .. } => {
                AgentPhase::AwaitingApproval
            }
            Self::ObservationTimeout { .. } => AgentPhase::Observing,
            Self::SessionAborted { .. }
            | Self::ExecutionTimeout { .. }
            | Self::ToolNotFound { .. }
            | Self::ToolExecutionFailed { .. }
            | Self::InvalidArguments { .. }
            | Self::DependencyUnsatisfied { .. }
            | Self::StepBudgetExceeded { .. }
            | Self::ToolBudgetExceeded { .. }
            | Self::DoomLoopDetected { .. }
            | Self::MaxIterationsExceeded { .. } => AgentPhase::Executing,
        }
    }

    /// Whether a later cycle may succeed where this one failed
    #[must_use]
    pub fn default_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration { .. }
                | Self::SessionActive { .. }
                | Self::SessionAborted { .. }
                | Self::ApprovalTimeout { .. }
                | Self::ToolNotFound { .. }
                | Self::ApprovalRejected { .. }
                | Self::DependencyUnsatisfied { .. }
                | Self::StepBudgetExceeded { .. }
                | Self::ToolBudgetExceeded { .. }
                | Self::DoomLoopDetected { .. }
                | Self::MaxIterationsExceeded { .. }
                | Self::LlmAuthentication { .. }
                | Self::ContextInvalid { .. }
        )
    }
}

/// An error raised anywhere in the agent pipeline
#[derive(Debug, Clone)]
pub struct AgentError {
    kind: AgentErrorKind,
    phase: AgentPhase,
    recoverable: bool,
    timestamp: DateTime<Utc>,
    partial_result: Option<Box<ExecutionResult>>,
}

impl AgentError {
    /// Create an error with the kind's default phase and recoverability
    #[must_use]
    pub fn new(kind: AgentErrorKind) -> Self {
        Self {
            phase: kind.default_phase(),
            recoverable: kind.default_recoverable(),
            kind,
            timestamp: Utc::now(),
            partial_result: None,
        }
    }

    /// Override the phase
    #[must_use]
    pub fn in_phase(mut self, phase: AgentPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Override recoverability
    #[must_use]
    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Attach the execution progress made before the failure
    #[must_use]
    pub fn with_partial_result(mut self, result: ExecutionResult) -> Self {
        self.partial_result = Some(Box::new(result));
        self
    }

    /// Kind-specific payload
    #[must_use]
    pub fn kind(&self) -> &AgentErrorKind {
        &self.kind
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Phase the error was raised in
    #[must_use]
    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    /// Whether the iteration logic may try again
    #[must_use]
    pub fn recoverable(&self) -> bool {
        self.recoverable
    }

    /// When the error was created
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Partial execution result, for errors raised mid-run
    #[must_use]
    pub fn partial_result(&self) -> Option<&ExecutionResult> {
        self.partial_result.as_deref()
    }

    /// Consume the error and take its partial result
    #[must_use]
    pub fn into_partial_result(self) -> Option<ExecutionResult> {
        self.partial_result.map(|r| *r)
    }

    /// Flatten into a key/value record for display or logging
    #[must_use]
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = match serde_json::to_value(&self.kind) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        record.insert("code".into(), Value::from(self.code()));
        record.insert("phase".into(), Value::from(self.phase.as_str()));
        record.insert("recoverable".into(), Value::from(self.recoverable));
        record.insert("message".into(), Value::from(self.to_string()));
        record.insert("timestamp".into(), Value::from(self.timestamp.to_rfc3339()));
        if let Some(partial) = &self.partial_result {
            record.insert(
                "completedSteps".into(),
                Value::from(partial.completed_steps.len()),
            );
            record.insert("failedSteps".into(), Value::from(partial.failed_steps.len()));
            record.insert("aborted".into(), Value::from(partial.aborted));
        }
        record
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for AgentError {}

impl Serialize for AgentError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

impl From<AgentErrorKind> for AgentError {
    fn from(kind: AgentErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<montage_tools::Error> for AgentError {
    fn from(err: montage_tools::Error) -> Self {
        match err {
            montage_tools::Error::NotFound(tool) => {
                AgentErrorKind::ToolNotFound { tool }.into()
            }
            montage_tools::Error::InvalidInput(message) => AgentErrorKind::InvalidArguments {
                tool: String::new(),
                errors: vec![message],
            }
            .into(),
            other => AgentErrorKind::ToolExecutionFailed {
                step_id: String::new(),
                tool: String::new(),
                tool_error: other.to_string(),
            }
            .into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

fn short_type_name<E>() -> String {
    let full = std::any::type_name::<E>();
    // keep generics intact, drop only the leading module path
    let head = full.split('<').next().unwrap_or(full);
    let short = head.rsplit("::").next().unwrap_or(head);
    format!("{}{}", short, &full[head.len()..])
}

/// Bring any error into the taxonomy.
///
/// Taxonomy errors pass through untouched; anything else becomes
/// [`AgentErrorKind::Unhandled`] in `phase`, marked recoverable.
pub fn wrap<E>(error: E, phase: AgentPhase) -> AgentError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let original_kind = short_type_name::<E>();
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(error);
    match boxed.downcast::<AgentError>() {
        Ok(agent) => *agent,
        Err(other) => AgentError::new(AgentErrorKind::Unhandled {
            message: other.to_string(),
            original_kind: Some(original_kind),
        })
        .in_phase(phase)
        .with_recoverable(true),
    }
}

/// Like [`wrap`] for already-boxed errors, where the type name is lost
pub fn wrap_boxed(error: Box<dyn std::error::Error + Send + Sync>, phase: AgentPhase) -> AgentError {
    match error.downcast::<AgentError>() {
        Ok(agent) => *agent,
        Err(other) => AgentError::new(AgentErrorKind::Unhandled {
            message: other.to_string(),
            original_kind: None,
        })
        .in_phase(phase)
        .with_recoverable(true),
    }
}

/// Recoverability of an arbitrary error; unknown errors are not recoverable
#[must_use]
pub fn classify_recoverable(error: &(dyn std::error::Error + 'static)) -> bool {
    error
        .downcast_ref::<AgentError>()
        .is_some_and(AgentError::recoverable)
}

/// The timeout error dedicated to `phase`
#[must_use]
pub fn timeout_for(phase: AgentPhase, timeout_ms: u64) -> AgentError {
    let kind = match phase {
        AgentPhase::Thinking => AgentErrorKind::ThinkingTimeout { timeout_ms },
        AgentPhase::Planning => AgentErrorKind::PlanningTimeout { timeout_ms },
        AgentPhase::AwaitingApproval => AgentErrorKind::ApprovalTimeout { timeout_ms },
        AgentPhase::Observing => AgentErrorKind::ObservationTimeout { timeout_ms },
        AgentPhase::Idle | AgentPhase::Executing => AgentErrorKind::ExecutionTimeout {
            timeout_ms,
            step_id: None,
        },
    };
    AgentError::new(kind).in_phase(phase)
}

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for AgentError {
    fn user_message(&self) -> String {
        match &self.kind {
            AgentErrorKind::PlanValidationFailed { validation_errors } => format!(
                "The generated plan was rejected ({} problem{}).",
                validation_errors.len(),
                if validation_errors.len() == 1 { "" } else { "s" }
            ),
            AgentErrorKind::ToolExecutionFailed { step_id, tool_error, .. } => {
                format!("Step {} failed: {}", step_id, tool_error)
            }
            AgentErrorKind::DoomLoopDetected { tool, .. } => {
                format!("Stopped because {} kept being called the same way.", tool)
            }
            AgentErrorKind::ToolBudgetExceeded { limit, .. } => {
                format!("Stopped after reaching the limit of {} tool calls.", limit)
            }
            AgentErrorKind::SessionAborted { .. } => "The run was cancelled.".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match &self.kind {
            AgentErrorKind::PlanValidationFailed { .. } => {
                Some("Try rephrasing the request or breaking it into smaller edits.".to_string())
            }
            AgentErrorKind::ToolNotFound { tool } => {
                Some(format!("'{}' is not an available editing tool.", tool))
            }
            AgentErrorKind::LlmRateLimited { .. } => {
                Some("Wait a moment before trying again.".to_string())
            }
            AgentErrorKind::LlmAuthentication { provider } => {
                Some(format!("Check the API key configured for {}.", provider))
            }
            AgentErrorKind::DoomLoopDetected { .. } | AgentErrorKind::MaxIterationsExceeded { .. } => {
                Some("Check the timeline state and describe the edit more precisely.".to_string())
            }
            AgentErrorKind::Configuration { .. } => {
                Some("Check config/default.toml or MONTAGE_* environment variables.".to_string())
            }
            _ => None,
        }
    }
}
