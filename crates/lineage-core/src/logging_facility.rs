//! Structured logging facility.
//!
//! One initialization point (`init(profile)`) and three boundary macros:
//!
//! - `log_op_start!(op, ...)` marks the start of an engine operation
//! - `log_op_end!(op, duration_ms = ...)` marks its successful end
//! - `log_op_error!(op, err, duration_ms = ...)` marks a failed end and
//!   records the stable error kind and code
//!
//! Only the engine emits boundary events. Store and core code log with
//! `tracing::debug!` so a single request produces exactly one start/end pair.
//!
//! ```rust
//! use lineage_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
