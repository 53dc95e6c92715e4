//! Execution scheduler
//!
//! Runs an already-validated plan while enforcing dependencies, per-step
//! timeouts, bounded retries, a tool-call budget and doom-loop prevention.
//!
//! # Module Structure
//!
//! - `config`: Limits and policies (ExecutorConfig)
//! - `order`: Topological ordering
//! - `doom_loop`: Repeated-invocation detector
//! - `progress`: Progress events, observer trait and broadcast bus
//! - `executor`: The run loop (PlanExecutor)
//! - `types`: Step records and execution results

mod config;
mod doom_loop;
mod executor;
mod order;
mod progress;
mod types;


pub use self::config::ExecutorConfig;
pub use doom_loop::{signature as invocation_signature, DoomLoopDetector};
pub use executor::PlanExecutor;
pub use order::execution_order;
pub use progress::{ProgressBus, ProgressEvent, ProgressObserver};
pub use types::{ExecutionResult, StepExecutionRecord};
