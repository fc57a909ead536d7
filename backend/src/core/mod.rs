//! Instance data and dense index arenas

pub mod grid;
pub mod instance;

pub use grid::{Grid2, Grid3};
pub use instance::{InstanceError, PlanningInstance};
