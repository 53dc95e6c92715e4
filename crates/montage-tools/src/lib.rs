//! Montage Tools - Tool catalog and execution ports
//!
//! This crate provides the tool side of the Montage orchestration core:
//! - Catalog / executor traits the scheduler and validator depend on
//! - Registry: tool registration, discovery and schema validation
//! - Runner: executor implementation over the registry
//! - Context: the editing-state snapshot handed to tools

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod context;
pub mod error;
pub mod registry;
pub mod runner;

pub use catalog::{ArgValidation, ToolCatalog, ToolExecutor};
pub use context::{EditingContext, EntityKind};
pub use error::{Error, Result};
pub use registry::{
    DeclaredTool, RiskLevel, Tool, ToolCategory, ToolDefinition, ToolOutcome, ToolRegistry,
};
pub use runner::{RunnerConfig, ToolRunner};
