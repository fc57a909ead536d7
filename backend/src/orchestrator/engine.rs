//! Rolling-horizon simulation engine
//!
//! Evaluates a production plan under sampled secondary-material
//! availability by walking the horizon period by period and re-optimizing
//! with everything already realized held fixed.
//!
//! # Architecture
//!
//! ```text
//! For each replicate r (strictly sequential, one shared model):
//!   reseed sampler with r + 1
//!   For each period τ:
//!   1. Solving      optimize(); non-optimal → OptimizationFailure
//!   2. (optional)   non-anticipativity re-solve
//!   3. Fixing       realize products and material recourse, LB = UB
//!   4. Pruning      remove all constraints scoped to τ
//!   5. Advancing    τ += 1
//!   record realized contribution margin
//!   Restoring       bounds back to [0, ∞), pruned constraints re-added
//! ```
//!
//! # Example
//!
//! ```rust
//! use mps_simulator_core::lp::MicroLpModel;
//! use mps_simulator_core::{PlanningInstance, RollingHorizonSimulator, SimulationConfig};
//!
//! let instance = PlanningInstance {
//!     num_products: 1,
//!     num_materials: 1,
//!     num_secondary: 1,
//!     num_periods: 2,
//!     price: vec![10.0],
//!     production_cost: vec![2.0],
//!     holding_cost: vec![1.0],
//!     demand: vec![vec![5.0, 5.0]],
//!     initial_inventory: vec![0.0],
//!     usage: vec![vec![1.0]],
//!     secondary_cost: vec![1.0],
//!     primary_cost: vec![3.0],
//!     availability: vec![vec![5.0, 5.0]],
//!     initial_secondary_stock: vec![0.0],
//!     fixed_capacity: vec![],
//! };
//! let config = SimulationConfig { num_simulations: 5, ..Default::default() };
//!
//! let mut simulator =
//!     RollingHorizonSimulator::from_instance(instance, config, MicroLpModel::new()).unwrap();
//! let plan = simulator.solve_initial().unwrap();
//! assert!((plan.objective - 70.0).abs() < 1e-6);
//!
//! let outcome = simulator.run_replicate(0).unwrap();
//! assert!(outcome.realized_cm <= 70.0 + 1e-6);
//! ```

use crate::core::{InstanceError, PlanningInstance};
use crate::lp::{LinearProgram, LpError, SolveStatus};
use crate::model::{ModelError, PlanModel, PlanningMode, SolvedPlan};
use crate::orchestrator::checkpoint::ModelSnapshot;
use crate::orchestrator::non_anticipativity::NonAnticipativityAdjuster;
use crate::orchestrator::open_loop;
use crate::orchestrator::state::{ModelState, Phase};
use crate::policy::{plan_fixings, FixingRecord};
use crate::results::{ResultAggregator, RunReport};
use crate::rng::ScenarioSampler;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration Types
// ============================================================================

/// What to do when a re-solve inside a replicate is not optimal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole run
    #[default]
    Abort,
    /// Record the failure, restore the model and continue with the next replicate
    Skip,
}

/// Simulation parameters
///
/// # Fields
///
/// * `num_simulations` - Replicates per simulation variant
/// * `epsilon` - Discount of the non-anticipativity surrogate; `0.0` disables the adjuster
/// * `objective_tolerance` - Relative noise floor on `f*`, used by the adjuster only
///   when pinning profit exactly is infeasible
/// * `failure_policy` - Handling of non-optimal re-solves
/// * `planning` - Expected-value or scenario-sampled planning LP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_simulations: usize,
    pub epsilon: f64,
    pub objective_tolerance: f64,
    pub failure_policy: FailurePolicy,
    pub planning: PlanningMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_simulations: 100,
            epsilon: 0.0,
            objective_tolerance: 1e-9,
            failure_policy: FailurePolicy::Abort,
            planning: PlanningMode::ExpectedValue,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.num_simulations == 0 {
            return Err(SimulationError::InvalidConfig(
                "num_simulations must be > 0".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "epsilon must be finite and >= 0, got {}",
                self.epsilon
            )));
        }
        if !self.objective_tolerance.is_finite() || self.objective_tolerance < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "objective_tolerance must be finite and >= 0, got {}",
                self.objective_tolerance
            )));
        }
        if let PlanningMode::ScenarioSampled { scenarios: 0, .. } = self.planning {
            return Err(SimulationError::InvalidConfig(
                "scenario count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Simulation error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid instance: {0}")]
    Instance(#[from] InstanceError),

    #[error("Solver interface error: {0}")]
    Lp(#[from] LpError),

    /// A solve did not reach optimality; `replicate`/`period` are `None`
    /// for the initial planning solve
    #[error("Optimization failed ({status}) in replicate {replicate:?}, period {period:?}")]
    OptimizationFailure {
        replicate: Option<usize>,
        period: Option<usize>,
        status: SolveStatus,
    },

    #[error("Invalid state transition {from:?} -> {to:?}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Model not restored to its pristine state: {0:?}")]
    RestoreDrift(Vec<String>),

    #[error("No replicate of the {0} simulation completed")]
    NoSuccessfulReplicates(&'static str),
}

impl From<ModelError> for SimulationError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Instance(inner) => SimulationError::Instance(inner),
            ModelError::Lp(inner) => SimulationError::Lp(inner),
            ModelError::NoScenarios | ModelError::ScenarioShape { .. } => {
                SimulationError::InvalidConfig(err.to_string())
            }
            ModelError::ConstraintCount { .. } => SimulationError::RestoreDrift(vec![err.to_string()]),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of one period step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodCommit {
    pub replicate: usize,
    pub period: usize,

    /// Whether the fixed values came from the non-anticipativity re-solve
    pub adjusted: bool,

    /// Profit of the solve the period was committed from
    pub objective: f64,

    /// Optimal profit before any non-anticipativity re-solve
    pub f_star: f64,

    pub record: FixingRecord,
}

/// Realized outcome of one replicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateOutcome {
    pub replicate: usize,

    /// `Σ p·z − k·y − h·x` over the realized schedule
    pub product_margin: f64,

    /// Secondary plus primary recourse cost
    pub material_cost: f64,

    /// `product_margin − material_cost`
    pub realized_cm: f64,

    /// Per-period fixings, in period order
    pub periods: Vec<FixingRecord>,
}

impl ReplicateOutcome {
    pub(crate) fn from_records(replicate: usize, product_margin: f64, periods: Vec<FixingRecord>) -> Self {
        let material_cost = periods.iter().map(FixingRecord::material_cost).sum::<f64>();
        Self {
            replicate,
            product_margin,
            material_cost,
            realized_cm: product_margin - material_cost,
            periods,
        }
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Rolling-horizon re-optimization and simulation engine
///
/// Owns the planning model and the replicate state machine. Only the
/// simulator mutates bounds and constraints; the fixing policy and the
/// aggregator work on value snapshots.
///
/// # Determinism
///
/// Replicate `r` samples from an RNG seeded with `r + 1`, and the LP
/// backend solves a problem that depends only on the current constraint
/// set. Running a replicate twice, in any order relative to others, gives
/// identical results.
pub struct RollingHorizonSimulator<L: LinearProgram> {
    /// Shared planning model
    model: PlanModel<L>,

    config: SimulationConfig,

    /// Availability shocks, reseeded per replicate
    sampler: ScenarioSampler,

    /// Present when `epsilon > 0`
    adjuster: Option<NonAnticipativityAdjuster>,

    state: ModelState,

    /// Commits of the replicate in progress
    commits: Vec<PeriodCommit>,
}

impl<L: LinearProgram> RollingHorizonSimulator<L> {
    /// Create a simulator over an already built model
    pub fn new(model: PlanModel<L>, config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let sampler = ScenarioSampler::for_instance(model.instance());
        let adjuster = (config.epsilon > 0.0)
            .then(|| NonAnticipativityAdjuster::new(config.epsilon, config.objective_tolerance));
        let state = ModelState::new(model.instance().num_periods);

        Ok(Self {
            model,
            config,
            sampler,
            adjuster,
            state,
            commits: Vec::new(),
        })
    }

    /// Build the planning model for `config.planning` into `lp` and wrap it
    pub fn from_instance(
        instance: PlanningInstance,
        config: SimulationConfig,
        lp: L,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let model = PlanModel::for_mode(instance, &config.planning, lp)?;
        Self::new(model, config)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn model(&self) -> &PlanModel<L> {
        &self.model
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Commits of the replicate in progress
    pub fn commits(&self) -> &[PeriodCommit] {
        &self.commits
    }

    /// Bounds and constraint set of the live model
    pub fn snapshot(&self) -> Result<ModelSnapshot, SimulationError> {
        Ok(ModelSnapshot::capture(self.model.lp())?)
    }

    // ========================================================================
    // Planning solve
    // ========================================================================

    /// Solve the unrestricted planning model
    ///
    /// The objective of the returned plan is the predicted contribution
    /// margin.
    ///
    /// # Errors
    /// - `InvalidTransition` if a replicate is in progress
    /// - `OptimizationFailure` if the planning LP is not optimal
    pub fn solve_initial(&mut self) -> Result<SolvedPlan, SimulationError> {
        if self.state.phase() != Phase::Idle || self.state.is_dirty() {
            return Err(SimulationError::InvalidTransition {
                from: self.state.phase(),
                to: Phase::Solving,
            });
        }

        let status = self.model.lp_mut().optimize();
        if !status.is_optimal() {
            return Err(SimulationError::OptimizationFailure {
                replicate: None,
                period: None,
                status,
            });
        }
        let plan = self.model.read_plan()?;
        info!(predicted_cm = plan.objective, "planning model solved");
        Ok(plan)
    }

    // ========================================================================
    // Replicate lifecycle
    // ========================================================================

    /// Start replicate `replicate` at period 0
    pub fn begin_replicate(&mut self, replicate: usize) -> Result<(), SimulationError> {
        self.state.begin(replicate)?;
        self.sampler.reseed(replicate);
        self.commits.clear();
        Ok(())
    }

    /// Run one period: solve, optionally adjust, fix, prune, advance
    ///
    /// On `Err` the replicate is left where it failed; call
    /// [`abort_replicate`](Self::abort_replicate) to restore the model.
    pub fn step(&mut self) -> Result<PeriodCommit, SimulationError> {
        let replicate = match (self.state.phase(), self.state.replicate()) {
            (Phase::Solving, Some(replicate)) => replicate,
            (phase, _) => {
                return Err(SimulationError::InvalidTransition {
                    from: phase,
                    to: Phase::Fixing,
                })
            }
        };
        let period = self.state.period();

        // Solving
        let status = self.model.lp_mut().optimize();
        if !status.is_optimal() {
            return Err(SimulationError::OptimizationFailure {
                replicate: Some(replicate),
                period: Some(period),
                status,
            });
        }
        let mut plan = self.model.read_plan()?;
        let f_star = plan.objective;
        let mut adjusted = false;
        if let Some(adjuster) = &self.adjuster {
            let adjustment = adjuster.adjust(&mut self.model, plan)?;
            adjusted = adjustment.adjusted;
            plan = adjustment.plan;
        }
        self.state.solved()?;

        // Fixing
        let realized: Vec<f64> = self
            .model
            .instance()
            .secondary_materials()
            .map(|i| self.sampler.sample_availability(i, period))
            .collect();
        let record = plan_fixings(self.model.instance(), &plan, period, &realized);
        self.model.apply_fixing(&record)?;
        self.state.fixed()?;

        // Pruning
        self.model.prune_period(period)?;
        self.state.pruned()?;

        // Advancing
        self.state.advance()?;

        debug!(
            replicate,
            period,
            adjusted,
            margin = record.product_margin(),
            material_cost = record.material_cost(),
            "period committed"
        );

        let commit = PeriodCommit {
            replicate,
            period,
            adjusted,
            objective: plan.objective,
            f_star,
            record,
        };
        self.commits.push(commit.clone());
        Ok(commit)
    }

    /// Collect the outcome of a completed replicate and restore the model
    pub fn finish_replicate(&mut self) -> Result<ReplicateOutcome, SimulationError> {
        let replicate = match (self.state.phase(), self.state.replicate()) {
            (Phase::Done, Some(replicate)) => replicate,
            (phase, _) => {
                return Err(SimulationError::InvalidTransition {
                    from: phase,
                    to: Phase::Restoring,
                })
            }
        };

        let periods: Vec<FixingRecord> = self.commits.drain(..).map(|c| c.record).collect();
        let product_margin = periods.iter().map(FixingRecord::product_margin).sum();
        let outcome = ReplicateOutcome::from_records(replicate, product_margin, periods);

        self.restore()?;
        Ok(outcome)
    }

    /// Abandon the replicate in progress, restoring the model
    ///
    /// No-op when idle.
    pub fn abort_replicate(&mut self) -> Result<(), SimulationError> {
        if self.state.phase() == Phase::Idle {
            return Ok(());
        }
        self.commits.clear();
        self.restore()
    }

    /// Run replicate `replicate` end to end; the model is restored on every path
    pub fn run_replicate(&mut self, replicate: usize) -> Result<ReplicateOutcome, SimulationError> {
        self.begin_replicate(replicate)?;
        while self.state.phase() == Phase::Solving {
            if let Err(err) = self.step() {
                self.abort_replicate()?;
                return Err(err);
            }
        }
        let outcome = self.finish_replicate()?;
        info!(
            replicate,
            realized_cm = outcome.realized_cm,
            "rolling replicate complete"
        );
        Ok(outcome)
    }

    fn restore(&mut self) -> Result<(), SimulationError> {
        self.state.begin_restore()?;
        self.model.restore(self.state.pruned_periods())?;
        self.state.restored()
    }

    // ========================================================================
    // Simulations
    // ========================================================================

    /// Closed-loop simulation: `num_simulations` rolling replicates
    ///
    /// Under [`FailurePolicy::Skip`] non-optimal re-solves are recorded as
    /// failures; every other error aborts. The model is verified to be back
    /// in its pristine state afterwards.
    pub fn simulate_rolling_schedule(&mut self) -> Result<ResultAggregator, SimulationError> {
        let before = self.snapshot()?;
        let mut aggregator = ResultAggregator::new();

        for replicate in 0..self.config.num_simulations {
            match self.run_replicate(replicate) {
                Ok(outcome) => aggregator.record(replicate, outcome.realized_cm),
                Err(err @ SimulationError::OptimizationFailure { .. })
                    if self.config.failure_policy == FailurePolicy::Skip =>
                {
                    warn!(replicate, error = %err, "skipping failed replicate");
                    aggregator.record_failure(replicate, err.to_string());
                }
                Err(err) => return Err(err),
            }
        }

        let after = self.snapshot()?;
        let drift = before.differences(&after);
        if !drift.is_empty() {
            return Err(SimulationError::RestoreDrift(drift));
        }
        Ok(aggregator)
    }

    /// Open-loop simulation of `plan` with the same replicate seeds
    pub fn simulate_schedule(&self, plan: &SolvedPlan) -> ResultAggregator {
        open_loop::simulate_schedule(self.model.instance(), plan, self.config.num_simulations)
    }

    /// Solve, simulate both variants, and assemble the report
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        let plan = self.solve_initial()?;
        let open_loop = self.simulate_schedule(&plan);
        info!(mean = ?open_loop.mean(), "open-loop simulation complete");
        let rolling = self.simulate_rolling_schedule()?;
        info!(
            mean = ?rolling.mean(),
            failures = rolling.failures().len(),
            "rolling simulation complete"
        );
        RunReport::build(self.model.instance(), &self.config, &plan, &open_loop, &rolling)
    }
}

impl<L: LinearProgram> std::fmt::Debug for RollingHorizonSimulator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingHorizonSimulator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("commits", &self.commits.len())
            .finish()
    }
}
