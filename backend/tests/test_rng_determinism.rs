//! RNG Determinism Tests
//!
//! Replicate `r` must see the same availability shocks every time it runs,
//! whatever ran before it.
//!
//! Critical invariants tested:
//! - Same seed produces the same sequence
//! - Reseeding the sampler restarts the replicate's stream
//! - Draws are integers in `[0, 2·A]`
//! - The scenario table depends only on its seed

use mps_simulator_core::rng::{replicate_seed, sample_scenario_table};
use mps_simulator_core::{PlanningInstance, RngManager, ScenarioSampler};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn instance() -> PlanningInstance {
    PlanningInstance {
        num_products: 1,
        num_materials: 2,
        num_secondary: 2,
        num_periods: 3,
        price: vec![10.0],
        production_cost: vec![2.0],
        holding_cost: vec![1.0],
        demand: vec![vec![5.0, 5.0, 5.0]],
        initial_inventory: vec![0.0],
        usage: vec![vec![1.0], vec![2.0]],
        secondary_cost: vec![1.0, 1.5],
        primary_cost: vec![3.0, 4.0],
        availability: vec![vec![5.0, 3.0, 7.0], vec![2.5, 0.0, 10.0]],
        initial_secondary_stock: vec![0.0, 1.0],
        fixed_capacity: vec![],
    }
}

/// Draw a whole replicate in simulation order: periods outer, materials inner
fn draw_replicate(sampler: &mut ScenarioSampler, replicate: usize, inst: &PlanningInstance) -> Vec<f64> {
    sampler.reseed(replicate);
    let mut draws = Vec::new();
    for t in 0..inst.num_periods {
        for i in inst.secondary_materials() {
            draws.push(sampler.sample_availability(i, t));
        }
    }
    draws
}

// ============================================================================
// RngManager
// ============================================================================

#[test]
fn test_same_seed_same_sequence() {
    let mut a = RngManager::new(42);
    let mut b = RngManager::new(42);
    for _ in 0..1000 {
        assert_eq!(a.next(), b.next());
    }
}

#[test]
fn test_different_seeds_different_sequences() {
    let a: Vec<u64> = {
        let mut rng = RngManager::new(1);
        (0..10).map(|_| rng.next()).collect()
    };
    let b: Vec<u64> = {
        let mut rng = RngManager::new(2);
        (0..10).map(|_| rng.next()).collect()
    };
    assert_ne!(a, b);
}

#[test]
fn test_range_inclusive_hits_both_ends() {
    let mut rng = RngManager::new(7);
    let draws: Vec<i64> = (0..2000).map(|_| rng.range_inclusive(0, 4)).collect();
    assert!(draws.iter().all(|d| (0..=4).contains(d)));
    assert!(draws.contains(&0));
    assert!(draws.contains(&4));
}

#[test]
fn test_state_resume_continues_sequence() {
    let mut rng = RngManager::new(99);
    rng.next();
    rng.next();
    let mut resumed = RngManager::from_state(rng.get_state());
    for _ in 0..50 {
        assert_eq!(rng.next(), resumed.next());
    }
}

// ============================================================================
// ScenarioSampler
// ============================================================================

#[test]
fn test_replicate_seeds_start_at_one() {
    assert_eq!(replicate_seed(0), 1);
    assert_eq!(replicate_seed(99), 100);
}

#[test]
fn test_reseed_reproduces_replicate() {
    let inst = instance();
    let mut sampler = ScenarioSampler::for_instance(&inst);

    let first = draw_replicate(&mut sampler, 3, &inst);
    draw_replicate(&mut sampler, 0, &inst);
    draw_replicate(&mut sampler, 7, &inst);
    let again = draw_replicate(&mut sampler, 3, &inst);

    assert_eq!(first, again);
}

#[test]
fn test_replicate_stream_independent_of_sampler_history() {
    let inst = instance();
    let mut fresh = ScenarioSampler::for_instance(&inst);
    let mut used = ScenarioSampler::for_instance(&inst);
    used.sample_availability(0, 0);
    used.sample_availability(1, 2);

    assert_eq!(
        draw_replicate(&mut fresh, 5, &inst),
        draw_replicate(&mut used, 5, &inst)
    );
}

#[test]
fn test_replicates_differ() {
    let inst = instance();
    let mut sampler = ScenarioSampler::for_instance(&inst);
    let streams: Vec<Vec<f64>> = (0..10).map(|r| draw_replicate(&mut sampler, r, &inst)).collect();
    assert!(streams.windows(2).any(|pair| pair[0] != pair[1]));
}

#[test]
fn test_draws_are_integers_within_twice_nominal() {
    let inst = instance();
    let mut sampler = ScenarioSampler::for_instance(&inst);
    for replicate in 0..200 {
        sampler.reseed(replicate);
        for t in 0..inst.num_periods {
            for i in inst.secondary_materials() {
                let draw = sampler.sample_availability(i, t);
                let ceiling = (2.0 * inst.availability[i][t]).floor();
                assert!(draw >= 0.0 && draw <= ceiling, "draw {} outside [0, {}]", draw, ceiling);
                assert_eq!(draw.fract(), 0.0);
            }
        }
    }
}

#[test]
fn test_zero_nominal_draws_zero() {
    let inst = instance();
    let mut sampler = ScenarioSampler::for_instance(&inst);
    for replicate in 0..50 {
        sampler.reseed(replicate);
        assert_eq!(sampler.sample_availability(1, 1), 0.0);
    }
}

// ============================================================================
// Scenario table
// ============================================================================

#[test]
fn test_scenario_table_shape_and_determinism() {
    let inst = instance();
    let a = sample_scenario_table(&inst, 4, 101);
    let b = sample_scenario_table(&inst, 4, 101);
    assert_eq!(a.dims(), (2, 3, 4));
    assert_eq!(a, b);

    let c = sample_scenario_table(&inst, 4, 102);
    assert_ne!(a, c);
}

#[test]
fn test_scenario_table_within_bounds() {
    let inst = instance();
    let table = sample_scenario_table(&inst, 16, 101);
    for i in 0..2 {
        for t in 0..3 {
            for &value in table.lane(i, t) {
                assert!(value >= 0.0 && value <= 2.0 * inst.availability[i][t]);
            }
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_sample_within_range(nominal in 0.0f64..500.0, replicate in 0usize..1000) {
        let mut sampler = ScenarioSampler::new(vec![vec![nominal]]);
        sampler.reseed(replicate);
        let draw = sampler.sample_availability(0, 0);
        prop_assert!(draw >= 0.0);
        prop_assert!(draw <= (2.0 * nominal).floor());
        prop_assert_eq!(draw.fract(), 0.0);
    }

    #[test]
    fn prop_reseed_is_pure(replicate in 0usize..10_000) {
        let mut a = ScenarioSampler::new(vec![vec![7.0, 3.0]]);
        let mut b = ScenarioSampler::new(vec![vec![7.0, 3.0]]);
        b.sample_availability(0, 1);
        a.reseed(replicate);
        b.reseed(replicate);
        prop_assert_eq!(a.sample_availability(0, 0), b.sample_availability(0, 0));
        prop_assert_eq!(a.sample_availability(0, 1), b.sample_availability(0, 1));
    }
}
