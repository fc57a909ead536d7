//! Orchestrator - rolling-horizon simulation loop
//!
//! Drives replicates period by period over the shared planning model.
//!
//! See `engine.rs` for the simulator, `state.rs` for the replicate phase
//! machine, and `checkpoint.rs` for restore verification.

pub mod checkpoint;
pub mod engine;
pub mod non_anticipativity;
pub mod open_loop;
pub mod state;

// Re-export main types for convenience
pub use engine::{
    FailurePolicy, PeriodCommit, ReplicateOutcome, RollingHorizonSimulator, SimulationConfig,
    SimulationError,
};
pub use non_anticipativity::{Adjustment, NonAnticipativityAdjuster};
pub use open_loop::{simulate_schedule, simulate_schedule_replicate};
pub use state::{ModelState, Phase};

// Re-export checkpoint types
pub use checkpoint::{ModelSnapshot, VariableBounds};
