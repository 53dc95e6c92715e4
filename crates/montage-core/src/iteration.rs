//! Iteration control
//!
//! Caps plan/execute cycles and stops early when the failure heuristics say
//! another cycle would fail the same way.

use crate::error::{AgentError, AgentErrorKind, Result};
use crate::failure::{
    detect_immediate_terminal_failure, detect_repeated_terminal_failure, TerminalGuidance,
};
use crate::scheduler::ExecutionResult;
use tracing::{debug, info};

/// What to do after observing a cycle's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationVerdict {
    /// Every step succeeded
    Done,
    /// Another cycle may help
    Continue,
    /// Another cycle would not help
    Stop(TerminalGuidance),
}

/// Tracks cycles for one request
#[derive(Debug, Clone)]
pub struct IterationController {
    max_iterations: usize,
    iteration: usize,
    previous: Option<ExecutionResult>,
}

impl IterationController {
    /// Create a controller allowing `max_iterations` cycles
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            iteration: 0,
            previous: None,
        }
    }

    /// Cycles started so far
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Configured cap
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Start a cycle, failing once the cap is reached
    pub fn begin_iteration(&mut self) -> Result<usize> {
        if self.iteration >= self.max_iterations {
            info!(max_iterations = self.max_iterations, "Iteration cap reached");
            return Err(AgentError::new(AgentErrorKind::MaxIterationsExceeded {
                max_iterations: self.max_iterations,
            }));
        }
        self.iteration += 1;
        debug!(iteration = self.iteration, "Iteration started");
        Ok(self.iteration)
    }

    /// Judge a cycle's result; only the latest result is remembered
    pub fn observe(&mut self, result: &ExecutionResult) -> IterationVerdict {
        if result.success {
            self.previous = None;
            return IterationVerdict::Done;
        }
        let guidance = detect_immediate_terminal_failure(result).or_else(|| {
            self.previous
                .as_ref()
                .and_then(|previous| detect_repeated_terminal_failure(previous, result))
        });
        self.previous = Some(result.clone());
        match guidance {
            Some(guidance) => {
                info!(signature = %guidance.failure_signature, "Terminal failure, stopping");
                IterationVerdict::Stop(guidance)
            }
            None => IterationVerdict::Continue,
        }
    }

    /// Forget all progress
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.previous = None;
    }
}
