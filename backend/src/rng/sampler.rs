//! Availability sampling
//!
//! Secondary-material availability realized during simulation is uniform on
//! the integers `[0, ⌊2·A_i[t]⌋]`, centered on the nominal bound `A_i[t]`
//! the plan was computed with. The doubled value is floored, not `A`
//! itself: `A = 2.5` draws from `[0, 5]`.
//!
//! # Draw order
//!
//! Simulations draw period by period, and within a period material by
//! material:
//!
//! ```text
//! for t in 0..T:
//!     for i in 0..α:
//!         sample_availability(i, t)
//! ```
//!
//! Both the rolling and the open-loop simulation follow this order, so the
//! same replicate index sees the same shocks in either variant.

use super::RngManager;
use crate::core::{Grid3, PlanningInstance};

/// Seed used for replicate `replicate`
pub fn replicate_seed(replicate: usize) -> u64 {
    replicate as u64 + 1
}

/// Highest integer draw for nominal availability `nominal`
fn draw_ceiling(nominal: f64) -> i64 {
    (2.0 * nominal).floor().max(0.0) as i64
}

/// Per-replicate source of availability shocks
///
/// # Example
/// ```
/// use mps_simulator_core::ScenarioSampler;
///
/// let mut sampler = ScenarioSampler::new(vec![vec![5.0, 5.0]]);
/// sampler.reseed(0);
/// let first = sampler.sample_availability(0, 0);
/// sampler.reseed(0);
/// assert_eq!(sampler.sample_availability(0, 0), first);
/// assert!((0.0..=10.0).contains(&first));
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioSampler {
    /// Nominal availability `A[i][t]`
    availability: Vec<Vec<f64>>,
    rng: RngManager,
}

impl ScenarioSampler {
    /// Create a sampler over nominal availability `A[i][t]`, seeded for replicate 0
    ///
    /// The table is not shape-checked here; [`PlanningInstance::validate`]
    /// guarantees `α × T` for [`for_instance`](Self::for_instance).
    pub fn new(availability: Vec<Vec<f64>>) -> Self {
        Self {
            availability,
            rng: RngManager::new(replicate_seed(0)),
        }
    }

    pub fn for_instance(instance: &PlanningInstance) -> Self {
        Self::new(instance.availability.clone())
    }

    /// Restart the stream for `replicate` (seed `replicate + 1`)
    pub fn reseed(&mut self, replicate: usize) {
        self.rng = RngManager::new(replicate_seed(replicate));
    }

    /// Draw realized availability of secondary material `material` in `period`
    ///
    /// Returns an integer-valued `f64` uniform on `[0, ⌊2·A[material][period]⌋]`.
    ///
    /// # Panics
    ///
    /// Panics if `material` or `period` lies outside the availability table
    /// the sampler was built with.
    pub fn sample_availability(&mut self, material: usize, period: usize) -> f64 {
        let ceiling = draw_ceiling(self.availability[material][period]);
        self.rng.range_inclusive(0, ceiling) as f64
    }
}

/// Draw the availability table `A_l[i][t][l]` for the scenario-sampled LP
///
/// Each entry is uniform on `[0, ⌊2·A_i[t]⌋]`, drawn in order materials →
/// periods → scenarios from an RNG seeded with `seed`.
pub fn sample_scenario_table(
    instance: &PlanningInstance,
    scenarios: usize,
    seed: u64,
) -> Grid3<f64> {
    let mut rng = RngManager::new(seed);
    Grid3::from_fn(
        instance.num_secondary,
        instance.num_periods,
        scenarios,
        |i, t, _| rng.range_inclusive(0, draw_ceiling(instance.availability[i][t])) as f64,
    )
}
