//! Aggregation engine
//!
//! Folds readings into per-bucket `{min, max, avg, count}` statistics. The
//! fold is incremental: readings are streamed from the store and only one
//! accumulator per bucket is kept.

mod engine;
mod stats;

pub use engine::*;
pub use stats::RunningStats;
