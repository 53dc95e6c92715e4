//! Orchestrator - Plan/validate/approve/execute cycles
//!
//! This module wires the plan producer, validator, approval gate and
//! scheduler into one loop per user intent.
//!
//! # Module Structure
//!
//! - `config`: Cycle settings and the producer request
//! - `core`: Orchestrator struct, builders and session bookkeeping
//! - `cycle`: Single cycles and the iterating run loop
//! - `ports`: Plan producer and approval gate traits

mod config;
mod core;
mod cycle;
mod ports;


pub use self::config::{OrchestratorSettings, PlanRequest};
pub use self::core::Orchestrator;
pub use cycle::RunOutcome;
pub use ports::{ApprovalDecision, ApprovalGate, PlanProducer};
