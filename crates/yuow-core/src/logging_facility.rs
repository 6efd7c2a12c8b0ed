//! Logging for units of work.
//!
//! Every attempt of a unit runs inside a `unit_of_work` span carrying
//! `unit_id` and `attempt`, so repository and provider events logged during
//! the attempt correlate without passing ids around. Boundaries use the
//! macros below with the keys in `yuow_core_types::schema`.
//!
//! ```rust
//! use yuow_core::logging_facility::{init, Profile};
//!
//! // Once, at process start; later calls are ignored
//! init(Profile::Development);
//! ```
//!
//! | macro | event | extra fields |
//! |---|---|---|
//! | `log_op_start!(op, ..)` | `start` | caller's |
//! | `log_op_end!(op, duration_ms = ..)` | `end` | `duration_ms` |
//! | `log_op_error!(op, err, duration_ms = ..)` | `end_error` | `err.kind`, `err.code`, `error` |
//!
//! Tests call [`init_test_capture`] instead of `init` and assert on the
//! captured events.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
