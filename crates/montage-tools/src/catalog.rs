//! Catalog and executor ports
//!
//! The orchestration core only talks to tools through these two traits.

use crate::context::EditingContext;
use crate::error::Result;
use crate::registry::{ToolDefinition, ToolOutcome};
use serde::{Deserialize, Serialize};

/// Result of checking arguments against a tool's schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgValidation {
    /// Whether the arguments are acceptable
    pub valid: bool,
    /// Human-readable problems, empty when valid
    pub errors: Vec<String>,
}

impl ArgValidation {
    /// A passing validation
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failing validation
    #[must_use]
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Read-only view of the available tools
pub trait ToolCatalog: Send + Sync {
    /// Check whether a tool exists and may be called
    fn has_tool(&self, name: &str) -> bool;

    /// Get a tool's declaration
    fn get_definition(&self, name: &str) -> Option<ToolDefinition>;

    /// Check arguments against the tool's declared schema
    fn validate_args(&self, name: &str, args: &serde_json::Value) -> ArgValidation;
}

/// Something that can actually run a tool
#[async_trait::async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool by name.
    ///
    /// Expected operational failures come back as `Ok` with
    /// `success: false`; `Err` is reserved for failures of the call itself.
    async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        context: &EditingContext,
    ) -> Result<ToolOutcome>;
}
