//! Registry - Tool registration and discovery
//!
//! This module provides a registry for the editing tools a plan may call.
//! Tools are registered with metadata and a JSON schema for their
//! arguments; the registry doubles as the [`ToolCatalog`] the plan
//! validator consults.

use crate::catalog::{ArgValidation, ToolCatalog};
use crate::context::EditingContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Risk level of a tool or plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only or trivially reversible
    Low,
    /// Edits with limited scope
    Medium,
    /// Destructive edits
    High,
    /// Project-wide or irreversible changes
    Critical,
}

impl RiskLevel {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a risk level from its string form
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Check if approval is required for this risk level
    #[must_use]
    pub fn requires_approval(&self) -> bool {
        *self >= Self::High
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool category for organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Clip placement and trimming
    Clip,
    /// Track management
    Track,
    /// Sequence management
    Sequence,
    /// Asset import and lookup
    Asset,
    /// Effects, transitions, captions
    Effect,
    /// Read-only analysis and queries
    Analysis,
    /// Utility operations
    Utility,
}

impl ToolCategory {
    /// Every category, in display order
    pub const ALL: [ToolCategory; 7] = [
        Self::Asset,
        Self::Sequence,
        Self::Track,
        Self::Clip,
        Self::Effect,
        Self::Analysis,
        Self::Utility,
    ];

    /// Parse a lowercase category name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clip => "clip",
            Self::Track => "track",
            Self::Sequence => "sequence",
            Self::Asset => "asset",
            Self::Effect => "effect",
            Self::Analysis => "analysis",
            Self::Utility => "utility",
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Tool metadata and schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for arguments
    pub parameters: serde_json::Value,
    /// Risk level
    pub risk_level: RiskLevel,
    /// Tool category
    pub category: ToolCategory,
    /// Whether the tool only reads project state
    #[serde(default)]
    pub read_only: bool,
    /// Whether the tool is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            risk_level: RiskLevel::Low,
            category: ToolCategory::Utility,
            read_only: false,
            enabled: true,
        }
    }

    /// Set the parameters schema
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the risk level
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Set the category
    #[must_use]
    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    /// Mark the tool as read-only
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Set enabled status
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Names listed under the schema's `required` array
    #[must_use]
    pub fn required_arg_names(&self) -> Vec<String> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Outcome of a single tool invocation
///
/// A tool reports expected operational failures as `success: false`
/// instead of returning an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    /// Whether execution succeeded
    pub success: bool,
    /// Output data, exposed to later steps under `data`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
    /// Whether the call changed project state
    #[serde(default)]
    pub side_effects: bool,
    /// Whether the call registered an undoable operation
    #[serde(default)]
    pub undoable: bool,
}

impl ToolOutcome {
    /// Create a successful outcome
    #[must_use]
    pub fn success(data: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms,
            side_effects: false,
            undoable: false,
        }
    }

    /// Create a failed outcome
    #[must_use]
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
            side_effects: false,
            undoable: false,
        }
    }

    /// Mark the outcome as having changed project state
    #[must_use]
    pub fn with_side_effects(mut self, undoable: bool) -> Self {
        self.side_effects = true;
        self.undoable = undoable;
        self
    }
}

/// Trait for tool implementations
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with given arguments
    async fn execute(
        &self,
        args: serde_json::Value,
        context: &EditingContext,
    ) -> Result<ToolOutcome>;
}

/// A tool known only by its declaration.
///
/// Used when a catalog is loaded from a description file for offline
/// validation; executing it always fails.
pub struct DeclaredTool {
    definition: ToolDefinition,
}

impl DeclaredTool {
    /// Wrap a definition
    #[must_use]
    pub fn new(definition: ToolDefinition) -> Self {
        Self { definition }
    }
}

#[async_trait::async_trait]
impl Tool for DeclaredTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _args: serde_json::Value,
        _context: &EditingContext,
    ) -> Result<ToolOutcome> {
        Err(Error::PermissionDenied(format!(
            "tool '{}' is declared but has no implementation",
            self.definition.name
        )))
    }
}

/// Registry for managing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: HashMap<String, ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            definitions: HashMap::new(),
        }
    }

    /// Build a registry of declaration-only tools
    #[must_use]
    pub fn from_definitions(definitions: Vec<ToolDefinition>) -> Self {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(Arc::new(DeclaredTool::new(def)));
        }
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let def = tool.definition();
        let name = def.name.clone();
        debug!(tool = %name, "Registering tool");
        self.definitions.insert(name.clone(), def.clone());
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names, sorted
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// List tools by category
    #[must_use]
    pub fn list_by_category(&self, category: ToolCategory) -> Vec<&ToolDefinition> {
        self.definitions
            .values()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Enable a tool
    pub fn enable(&mut self, name: &str) -> bool {
        if let Some(def) = self.definitions.get_mut(name) {
            def.enabled = true;
            true
        } else {
            false
        }
    }

    /// Disable a tool
    pub fn disable(&mut self, name: &str) -> bool {
        if let Some(def) = self.definitions.get_mut(name) {
            def.enabled = false;
            true
        } else {
            false
        }
    }

    /// Get tool count
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Current definition, including enable/disable overrides
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }
}

impl ToolCatalog for ToolRegistry {
    fn has_tool(&self, name: &str) -> bool {
        self.definitions.get(name).is_some_and(|d| d.enabled)
    }

    fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.definitions.get(name).cloned()
    }

    fn validate_args(&self, name: &str, args: &serde_json::Value) -> ArgValidation {
        let Some(def) = self.definitions.get(name) else {
            return ArgValidation::invalid(vec![format!("tool '{}' is not registered", name)]);
        };
        if !args.is_object() {
            return ArgValidation::invalid(vec!["arguments must be an object".to_string()]);
        }

        let validator = match jsonschema::validator_for(&def.parameters) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool declares an invalid argument schema");
                let err = Error::InvalidSchema {
                    tool: name.to_string(),
                    message: e.to_string(),
                };
                return ArgValidation::invalid(vec![err.to_string()]);
            }
        };

        let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            ArgValidation::valid()
        } else {
            ArgValidation::invalid(errors)
        }
    }
}
