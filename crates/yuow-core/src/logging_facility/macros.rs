//! Operation boundary macros
//!
//! Each macro emits one `tracing` event tagged with `component`, `op` and
//! `event`, using the keys in `yuow_core_types::schema`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use yuow_core::log_op_start;
/// log_op_start!("flush");
/// log_op_start!("flush", repository = "customers");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use yuow_core::log_op_end;
/// log_op_end!("flush", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// `$err` is anything that derefs to a `UowError`; its kind and stable code
/// are attached as `err.kind` / `err.code`.
///
/// # Example
///
/// ```
/// # use yuow_core::{log_op_error, errors::UowError};
/// let err = UowError::config("max_attempts must be at least 1");
/// log_op_error!("run", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let uow_err: &$crate::errors::UowError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?uow_err.kind(),
            err.code = uow_err.code(),
            error = %uow_err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let uow_err: &$crate::errors::UowError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?uow_err.kind(),
            err.code = uow_err.code(),
            error = %uow_err,
            $($field)*
        );
    }};
}
