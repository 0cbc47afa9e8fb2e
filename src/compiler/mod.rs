//! Request compiler (verb module)
//!
//! Turns a column collection plus an explicit time context into the nested
//! aggregation request, validating time shifts on the way. Also builds the
//! query-level time filter that goes with a compiled request.

mod compile;
mod error;
mod time_shift;

pub use compile::{compile, CompileOptions};
pub(crate) use compile::split_position;
pub use error::{CompileError, TimeShiftErrorReason};
pub use time_shift::{search_time_filter, validate_time_shifts};
pub(crate) use time_shift::shifted_time_filter;
