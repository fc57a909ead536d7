//! Results - aggregation and reporting

pub mod aggregator;
pub mod report;

pub use aggregator::{AggregateStats, ReplicateFailure, ResultAggregator};
pub use report::{service_levels, MaterialRow, ProductRow, RunReport, Summary};
