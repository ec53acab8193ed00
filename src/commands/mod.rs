//! Command implementations
//!
//! Each command turns its arguments into criteria or an identity, runs the
//! fetcher or the aggregator, and returns an [`Output`](crate::view::Output)
//! for the executor to project and render.

pub mod compute;
pub mod storage;

pub use compute::InstanceFilters;
pub use storage::{BucketFilters, DEFAULT_MAX_KEYS};
