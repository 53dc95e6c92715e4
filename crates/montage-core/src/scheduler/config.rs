//! Scheduler configuration

use crate::error::{AgentError, AgentErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and policies for one scheduler run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-attempt timeout in milliseconds
    pub step_timeout_ms: u64,
    /// Retries allowed per step for transient failures
    pub max_retries: u32,
    /// First retry backoff in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,
    /// Tool invocations allowed per run, retries included
    pub max_tool_calls: usize,
    /// Steps allowed per plan
    pub max_steps: usize,
    /// Consecutive identical invocations that count as a loop.
    ///
    /// Retries repeat the same invocation, so this must exceed
    /// `max_retries + 1` for every retry to be usable. Values below 2
    /// disable detection.
    pub doom_loop_threshold: usize,
    /// Halt after the first failed step
    pub stop_on_error: bool,
    /// Run ready independent steps concurrently
    pub parallel: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 30_000,
            max_retries: 1,
            retry_initial_delay_ms: 250,
            retry_max_delay_ms: 4_000,
            max_tool_calls: 100,
            max_steps: 50,
            doom_loop_threshold: 3,
            stop_on_error: true,
            parallel: false,
        }
    }
}

impl ExecutorConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry limit
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff bounds
    #[must_use]
    pub fn with_retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_delay_ms = initial.as_millis() as u64;
        self.retry_max_delay_ms = max.as_millis() as u64;
        self
    }

    /// Set the tool call budget
    #[must_use]
    pub fn with_max_tool_calls(mut self, calls: usize) -> Self {
        self.max_tool_calls = calls;
        self
    }

    /// Set the step budget
    #[must_use]
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// Set the doom-loop threshold
    #[must_use]
    pub fn with_doom_loop_threshold(mut self, threshold: usize) -> Self {
        self.doom_loop_threshold = threshold;
        self
    }

    /// Set the stop policy
    #[must_use]
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Enable or disable parallel batches
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Reject settings where the loop detector would cut retries short
    pub fn validate(&self) -> Result<()> {
        let attempts = self.max_retries as usize + 1;
        if self.doom_loop_threshold >= 2 && self.doom_loop_threshold <= attempts {
            return Err(AgentError::new(AgentErrorKind::Configuration {
                reason: format!(
                    "executor.doom_loop_threshold ({}) must be greater than max_retries + 1 ({})",
                    self.doom_loop_threshold, attempts
                ),
            }));
        }
        Ok(())
    }

    /// Per-attempt timeout
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Backoff before retry number `retry` (1-based), doubling up to the cap
    #[must_use]
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let delay = self
            .retry_initial_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(delay)
    }
}
