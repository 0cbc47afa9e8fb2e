//! Time context types
//!
//! Time ranges, shift durations and date histogram intervals. All of it is
//! passed explicitly into the compiler and the post-processor.

mod interval;
mod range;
mod shift;

pub use interval::{auto_interval, DateInterval, ParseIntervalError};
pub use range::{TimeContext, TimeRange};
pub use shift::{ParseTimeShiftError, ResolvedShift, ShiftDuration, TimeShift, TimeUnit};
