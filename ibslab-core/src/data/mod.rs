//! Market data preparation applied before bars reach the engine.

pub mod splits;

pub use splits::{adjust_for_splits, cumulative_factor};
