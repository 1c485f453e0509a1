//! Boundary logging macros.
//!
//! Callers must depend on `lineage-core-types`, which provides the event names.

/// Log the start of an operation.
///
/// ```
/// # use lineage_core::log_op_start;
/// log_op_start!("resolve");
/// log_op_start!("resolve", module_id = 7);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation.
///
/// ```
/// # use lineage_core::log_op_end;
/// log_op_end!("resolve", duration_ms = 3);
/// log_op_end!("resolve", duration_ms = 3, resolved_len = 12);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log the failed end of an operation.
///
/// `err` is anything convertible into `ExError`; its kind and stable code are
/// recorded.
///
/// ```
/// # use lineage_core::log_op_error;
/// # use lineage_core::errors::{ExError, ExErrorKind};
/// let err = ExError::new(ExErrorKind::Conflict);
/// log_op_error!("transition", err, duration_ms = 5);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = lineage_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            $($field)*
        );
    }};
}
