//! Command orchestration layer.
//!
//! Each command opens its own transaction on the connection it is given, so
//! callers never hold a transaction across commands.

pub mod check;
pub mod engine_command;
pub mod relations;
pub mod resolve;
pub mod transition;
