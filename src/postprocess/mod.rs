//! Response post-processing (verb module)
//!
//! A request compiled with time shifts comes back with a synthetic
//! `time_offset_split` at the split position. Post-processing folds those
//! branches into the baseline tree so consumers see the same shape as an
//! unshifted response, plus `doc_count_<ms>` entries and the shifted metric
//! values.

mod merge;

pub use merge::post_flight_transform;
