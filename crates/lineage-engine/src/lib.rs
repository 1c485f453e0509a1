//! Lineage Engine - Orchestration layer.
//!
//! Runs each request as one store transaction on top of the core rules:
//! resolution, module transitions (with the completion merge), relation
//! overwrites and hierarchy checks.

pub mod commands;

pub use commands::engine_command::{apply_engine_command, EngineCommand, EngineCommandResult};
pub use commands::transition::TransitionOutcome;
