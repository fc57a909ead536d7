//! Planning model: LP construction and solved-plan snapshots

pub mod builder;
pub mod plan;

pub use builder::{
    ConstraintSpec, ModelError, ModelVariables, PlanModel, PlanningMode, OPTIMALITY_CONSTRAINT,
};
pub use plan::SolvedPlan;
