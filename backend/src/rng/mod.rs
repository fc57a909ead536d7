//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: All randomness in the simulator MUST go through this module.
//!
//! - [`RngManager`]: the raw generator
//! - [`ScenarioSampler`]: availability shocks, reseeded per replicate
//! - [`sample_scenario_table`]: availability paths for the scenario-sampled LP

mod sampler;
mod xorshift;

pub use sampler::{replicate_seed, sample_scenario_table, ScenarioSampler};
pub use xorshift::RngManager;
