//! Core types shared across yuow facilities
//!
//! This crate provides foundational types used by both the error and
//! logging facilities of the kernel:
//!
//! - **Correlation types**: UnitId, AttemptContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{AttemptContext, UnitId};
