//! Restore Tests
//!
//! Every replicate must leave the planning model exactly as it found it:
//! bit-identical bounds and the same named-constraint set. Failures are
//! injected through a wrapper backend that reports `Infeasible` on chosen
//! optimize calls.

use mps_simulator_core::lp::{
    ConstraintRef, Direction, LinearExpr, LinearProgram, LpError, MicroLpModel, Sense, SolveStatus,
    VarRef,
};
use mps_simulator_core::orchestrator::{ModelSnapshot, Phase};
use mps_simulator_core::{
    FailurePolicy, PlanningInstance, RollingHorizonSimulator, SimulationConfig, SimulationError,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Delegates to `MicroLpModel` but fails the optimize calls listed in `fail_on`
struct FlakyLp {
    inner: MicroLpModel,
    calls: usize,
    fail_on: Vec<usize>,
}

impl FlakyLp {
    fn failing_on(fail_on: Vec<usize>) -> Self {
        Self {
            inner: MicroLpModel::new(),
            calls: 0,
            fail_on,
        }
    }
}

impl LinearProgram for FlakyLp {
    fn add_variable(&mut self, name: &str, lower: f64, upper: f64) -> Result<VarRef, LpError> {
        self.inner.add_variable(name, lower, upper)
    }

    fn add_constraint(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: Sense,
        rhs: f64,
    ) -> Result<ConstraintRef, LpError> {
        self.inner.add_constraint(name, expr, sense, rhs)
    }

    fn remove_constraint(&mut self, name: &str) -> Result<(), LpError> {
        self.inner.remove_constraint(name)
    }

    fn has_constraint(&self, name: &str) -> bool {
        self.inner.has_constraint(name)
    }

    fn constraint_names(&self) -> Vec<String> {
        self.inner.constraint_names()
    }

    fn set_bounds(&mut self, var: VarRef, lower: f64, upper: f64) -> Result<(), LpError> {
        self.inner.set_bounds(var, lower, upper)
    }

    fn bounds(&self, var: VarRef) -> Result<(f64, f64), LpError> {
        self.inner.bounds(var)
    }

    fn variable_name(&self, var: VarRef) -> Result<&str, LpError> {
        self.inner.variable_name(var)
    }

    fn num_variables(&self) -> usize {
        self.inner.num_variables()
    }

    fn set_objective(&mut self, expr: LinearExpr, direction: Direction) {
        self.inner.set_objective(expr, direction)
    }

    fn optimize(&mut self) -> SolveStatus {
        let call = self.calls;
        self.calls += 1;
        let status = self.inner.optimize();
        if self.fail_on.contains(&call) {
            SolveStatus::Infeasible
        } else {
            status
        }
    }

    fn value(&self, var: VarRef) -> Result<f64, LpError> {
        self.inner.value(var)
    }

    fn objective_value(&self) -> Result<f64, LpError> {
        self.inner.objective_value()
    }
}

fn instance() -> PlanningInstance {
    PlanningInstance {
        num_products: 2,
        num_materials: 2,
        num_secondary: 1,
        num_periods: 2,
        price: vec![10.0, 7.0],
        production_cost: vec![2.0, 1.0],
        holding_cost: vec![1.0, 1.0],
        demand: vec![vec![5.0, 5.0], vec![3.0, 4.0]],
        initial_inventory: vec![0.0, 1.0],
        usage: vec![vec![1.0, 1.0], vec![1.0, 2.0]],
        secondary_cost: vec![1.0],
        primary_cost: vec![3.0],
        availability: vec![vec![4.0, 6.0]],
        initial_secondary_stock: vec![2.0],
        fixed_capacity: vec![vec![12.0, 12.0]],
    }
}

fn config(num_simulations: usize, failure_policy: FailurePolicy) -> SimulationConfig {
    SimulationConfig {
        num_simulations,
        failure_policy,
        ..Default::default()
    }
}

// ============================================================================
// Restore after success
// ============================================================================

#[test]
fn test_restore_reproduces_pristine_model() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(3, FailurePolicy::Abort),
        MicroLpModel::new(),
    )
    .unwrap();
    let pristine = sim.snapshot().unwrap();

    for replicate in 0..3 {
        sim.run_replicate(replicate).unwrap();
        let after = sim.snapshot().unwrap();
        assert!(pristine.differences(&after).is_empty());
        assert_eq!(pristine.fingerprint(), after.fingerprint());
    }
}

#[test]
fn test_all_bounds_released_after_replicate() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(1, FailurePolicy::Abort),
        MicroLpModel::new(),
    )
    .unwrap();
    sim.run_replicate(0).unwrap();

    let snapshot = ModelSnapshot::capture(sim.model().lp()).unwrap();
    for var in &snapshot.bounds {
        assert_eq!(var.lower, Some(0.0), "{}", var.name);
        assert_eq!(var.upper, None, "{}", var.name);
    }
}

#[test]
fn test_snapshot_detects_dirty_model_mid_replicate() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(1, FailurePolicy::Abort),
        MicroLpModel::new(),
    )
    .unwrap();
    let pristine = sim.snapshot().unwrap();

    sim.begin_replicate(0).unwrap();
    sim.step().unwrap();
    let dirty = sim.snapshot().unwrap();
    let diffs = pristine.differences(&dirty);
    assert!(diffs.iter().any(|d| d.starts_with("bounds of y[0,0]")));
    assert!(diffs.iter().any(|d| d == "constraint SalesConstraint_0_0 missing"));
    assert_ne!(pristine.fingerprint(), dirty.fingerprint());

    sim.abort_replicate().unwrap();
    assert!(pristine.differences(&sim.snapshot().unwrap()).is_empty());
}

#[test]
fn test_restore_is_idempotent_across_runs() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(4, FailurePolicy::Abort),
        MicroLpModel::new(),
    )
    .unwrap();
    let first = sim.simulate_rolling_schedule().unwrap();
    let second = sim.simulate_rolling_schedule().unwrap();
    assert_eq!(first.samples(), second.samples());
}

// ============================================================================
// Restore after failure
// ============================================================================

#[test]
fn test_abort_policy_surfaces_failure_and_restores() {
    // Calls 0-1 are replicate 0, call 3 is replicate 1 period 1
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(3, FailurePolicy::Abort),
        FlakyLp::failing_on(vec![3]),
    )
    .unwrap();
    let pristine = sim.snapshot().unwrap();

    let err = sim.simulate_rolling_schedule().unwrap_err();
    assert_eq!(
        err,
        SimulationError::OptimizationFailure {
            replicate: Some(1),
            period: Some(1),
            status: SolveStatus::Infeasible,
        }
    );
    assert_eq!(sim.state().phase(), Phase::Idle);
    assert!(pristine.differences(&sim.snapshot().unwrap()).is_empty());
}

#[test]
fn test_skip_policy_records_failure_and_continues() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(3, FailurePolicy::Skip),
        FlakyLp::failing_on(vec![3]),
    )
    .unwrap();

    let aggregator = sim.simulate_rolling_schedule().unwrap();
    assert_eq!(aggregator.count(), 2);
    assert_eq!(aggregator.failures().len(), 1);
    assert_eq!(aggregator.failures()[0].replicate, 1);
    assert!(aggregator.failures()[0].reason.contains("infeasible"));

    let replicates: Vec<usize> = aggregator.samples().iter().map(|(r, _)| *r).collect();
    assert_eq!(replicates, vec![0, 2]);
}

#[test]
fn test_skip_policy_with_every_replicate_failing() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(2, FailurePolicy::Skip),
        FlakyLp::failing_on(vec![0, 1]),
    )
    .unwrap();
    let aggregator = sim.simulate_rolling_schedule().unwrap();
    assert_eq!(aggregator.count(), 0);
    assert_eq!(aggregator.mean(), None);
}

#[test]
fn test_failed_initial_solve_is_reported() {
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(1, FailurePolicy::Abort),
        FlakyLp::failing_on(vec![0]),
    )
    .unwrap();
    assert_eq!(
        sim.solve_initial().unwrap_err(),
        SimulationError::OptimizationFailure {
            replicate: None,
            period: None,
            status: SolveStatus::Infeasible,
        }
    );
}

#[test]
fn test_run_without_successful_replicates_errors() {
    // Call 0 is the planning solve; every rolling solve after it fails
    let mut sim = RollingHorizonSimulator::from_instance(
        instance(),
        config(2, FailurePolicy::Skip),
        FlakyLp::failing_on(vec![1, 2]),
    )
    .unwrap();
    assert_eq!(
        sim.run().unwrap_err(),
        SimulationError::NoSuccessfulReplicates("rolling")
    );
}
