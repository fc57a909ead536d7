//! MPS Simulator Core - Rust Engine
//!
//! Rolling-horizon re-optimization and simulation of circular master
//! production schedules under uncertain secondary-material availability.
//!
//! # Architecture
//!
//! - **core**: Planning instance and dense index arenas
//! - **lp**: Linear program interface and the `microlp` backend
//! - **model**: Planning LP construction and solved-plan snapshots
//! - **policy**: Variable fixing and material recourse
//! - **orchestrator**: Rolling-horizon and open-loop simulation
//! - **results**: Aggregation and reporting
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (replicate `r` is seeded with `r + 1`)
//! 2. Only the simulator mutates the planning model
//! 3. Every replicate leaves the model exactly as it found it

// Module declarations
pub mod core;
pub mod lp;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod results;
pub mod rng;

// Re-exports for convenience
pub use core::{Grid2, Grid3, InstanceError, PlanningInstance};
pub use lp::{LinearProgram, LpError, MicroLpModel, SolveStatus};
pub use model::{ModelError, PlanModel, PlanningMode, SolvedPlan};
pub use orchestrator::{
    FailurePolicy, ModelSnapshot, ReplicateOutcome, RollingHorizonSimulator, SimulationConfig,
    SimulationError,
};
pub use policy::FixingRecord;
pub use results::{AggregateStats, ResultAggregator, RunReport};
pub use rng::{RngManager, ScenarioSampler};
