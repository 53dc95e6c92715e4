//! Orchestrator core structure
//!
//! Contains the `Orchestrator` struct, its builder methods and session
//! bookkeeping.

use super::config::OrchestratorSettings;
use super::ports::{ApprovalGate, PlanProducer};
use crate::config::MontageConfig;
use crate::error::{AgentError, AgentErrorKind, Result};
use crate::scheduler::{PlanExecutor, ProgressObserver};
use crate::validator::PlanValidator;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use montage_tools::{EditingContext, ToolCatalog, ToolExecutor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drives planning cycles against the collaborator ports
pub struct Orchestrator {
    pub(crate) producer: Arc<dyn PlanProducer>,
    pub(crate) validator: PlanValidator,
    pub(crate) executor: PlanExecutor,
    pub(crate) approval_gate: Option<Arc<dyn ApprovalGate>>,
    pub(crate) observer: Option<Arc<dyn ProgressObserver>>,
    pub(crate) settings: OrchestratorSettings,
    /// Running sessions with their cancellation tokens
    pub(crate) active_sessions: Arc<DashMap<String, CancellationToken>>,
}

impl Orchestrator {
    /// Create a new orchestrator
    #[must_use]
    pub fn new(
        producer: Arc<dyn PlanProducer>,
        catalog: Arc<dyn ToolCatalog>,
        tools: Arc<dyn ToolExecutor>,
        config: MontageConfig,
    ) -> Self {
        Self {
            producer,
            validator: PlanValidator::new(catalog, config.validator),
            executor: PlanExecutor::new(tools, config.executor),
            approval_gate: None,
            observer: None,
            settings: config.orchestrator,
            active_sessions: Arc::new(DashMap::new()),
        }
    }

    /// Set the approval gate for risky plans
    #[must_use]
    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.approval_gate = Some(gate);
        self
    }

    /// Set the progress observer for execution events
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get the planning settings
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Get the plan validator
    #[must_use]
    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    /// Whether a session currently has a running cycle
    #[must_use]
    pub fn is_active(&self, session_id: &str) -> bool {
        self.active_sessions.contains_key(session_id)
    }

    /// Cancel a running session; returns false if none is running
    pub fn cancel_session(&self, session_id: &str) -> bool {
        match self.active_sessions.get(session_id) {
            Some(token) => {
                info!(session_id = %session_id, "Cancelling session");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Register the context's session for the duration of a run.
    ///
    /// Returns the token the run should observe; it is cancelled when either
    /// `cancel` or [`Orchestrator::cancel_session`] fires.
    pub(crate) fn claim_session(
        &self,
        context: &EditingContext,
        cancel: &CancellationToken,
    ) -> Result<SessionGuard> {
        let token = cancel.child_token();
        let Some(session_id) = context.session_id.clone() else {
            return Ok(SessionGuard {
                sessions: None,
                session_id: String::new(),
                token,
            });
        };
        match self.active_sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => Err(AgentError::new(AgentErrorKind::SessionActive {
                session_id,
            })),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                debug!(session_id = %session_id, "Session claimed");
                Ok(SessionGuard {
                    sessions: Some(Arc::clone(&self.active_sessions)),
                    session_id,
                    token,
                })
            }
        }
    }
}

/// Releases a claimed session when dropped
pub(crate) struct SessionGuard {
    sessions: Option<Arc<DashMap<String, CancellationToken>>>,
    session_id: String,
    token: CancellationToken,
}

impl SessionGuard {
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(sessions) = &self.sessions {
            sessions.remove(&self.session_id);
        }
    }
}
