//! Planning model construction
//!
//! Builds the master production scheduling LP on top of any
//! [`LinearProgram`] and keeps typed handles to every variable.
//!
//! # Model
//!
//! ```text
//! max Σ_t [ Σ_j (p_j z[j,t] − k_j y[j,t] − h_j x[j,t+1])
//!          − (1/q) Σ_l Σ_{i∈I_A} (b_i v[i,t,l] + c_i w[i,t,l]) ]
//!
//! ResourceConstraint_{i}_{t}               Σ_j a[i][j] y[j,t] ≤ R_fix[i−α][t]   i ∉ I_A
//! InventoryInitProduct_{j}                 x[j,0] = x_a_j
//! InventoryInitSecondary_{i}_{l}           R[i,0,l] = R_a_i
//! InventoryBalanceProduct_{j}_{t}          x[j,t+1] = x[j,t] + y[j,t] − z[j,t]
//! SalesConstraint_{j}_{t}                  z[j,t] ≤ d[j][t]
//! InventoryBalanceSecondary_{i}_{t}_{l}    R[i,t+1,l] = R[i,t,l] + v + w − Σ_j a[i][j] y[j,t]
//! AvailabilityConstraint_{i}_{t}_{l}       v[i,t,l] ≤ A_l[i][t][l]
//! ```
//!
//! The expected-value model is the special case `q = 1` with
//! `A_l[i][t][0] = A[i][t]`.
//!
//! Constraints whose name ends in a period index are *period-scoped*: the
//! rolling-horizon simulator removes them once that period is fixed and
//! re-adds them from [`PlanModel::period_constraints`] on restore.

use super::plan::SolvedPlan;
use crate::core::{Grid2, Grid3, InstanceError, PlanningInstance};
use crate::lp::{Direction, LinearExpr, LinearProgram, LpError, Sense, VarRef};
use crate::policy::FixingRecord;
use crate::rng::sample_scenario_table;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the temporary constraint pinning profit during a re-solve
///
/// It is never part of the built model; [`PlanModel::restore`] fails if one
/// is left behind.
pub const OPTIMALITY_CONSTRAINT: &str = "OptimalityConstraint";

/// Model construction and restore errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid instance: {0}")]
    Instance(#[from] InstanceError),

    #[error("Solver interface error: {0}")]
    Lp(#[from] LpError),

    #[error("Scenario count must be > 0")]
    NoScenarios,

    #[error("Scenario table shape {found:?} does not match {expected:?} (secondary materials, periods)")]
    ScenarioShape {
        expected: (usize, usize),
        found: (usize, usize, usize),
    },

    #[error("Model holds {found} constraints after restore, expected {expected}")]
    ConstraintCount { expected: usize, found: usize },
}

/// Which availability the planning LP is built against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    /// Single scenario at nominal availability
    ExpectedValue,

    /// `scenarios` availability paths drawn with `seed`
    ScenarioSampled {
        scenarios: usize,
        #[serde(default = "default_planning_seed")]
        seed: u64,
    },
}

fn default_planning_seed() -> u64 {
    101
}

impl Default for PlanningMode {
    fn default() -> Self {
        PlanningMode::ExpectedValue
    }
}

impl PlanningMode {
    /// Availability table `A_l[i][t][l]` for this mode
    pub fn scenario_table(&self, instance: &PlanningInstance) -> Result<Grid3<f64>, ModelError> {
        match *self {
            PlanningMode::ExpectedValue => Ok(Grid3::from_fn(
                instance.num_secondary,
                instance.num_periods,
                1,
                |i, t, _| instance.availability[i][t],
            )),
            PlanningMode::ScenarioSampled { scenarios, seed } => {
                if scenarios == 0 {
                    return Err(ModelError::NoScenarios);
                }
                Ok(sample_scenario_table(instance, scenarios, seed))
            }
        }
    }
}

/// Named constraint ready to be added to a model
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSpec {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl ConstraintSpec {
    fn new(name: String, expr: LinearExpr, sense: Sense, rhs: f64) -> Self {
        Self {
            name,
            expr,
            sense,
            rhs,
        }
    }
}

/// Handles of every decision variable, in dense arenas
#[derive(Debug, Clone)]
pub struct ModelVariables {
    /// `x[j,t]`, shape `(n, T+1)`
    pub inventory: Grid2<VarRef>,
    /// `y[j,t]`, shape `(n, T)`
    pub production: Grid2<VarRef>,
    /// `z[j,t]`, shape `(n, T)`
    pub sales: Grid2<VarRef>,
    /// `v[i,t,l]`, shape `(α, T, q)`
    pub secondary_procurement: Grid3<VarRef>,
    /// `w[i,t,l]`, shape `(α, T, q)`
    pub primary_procurement: Grid3<VarRef>,
    /// `R[i,t,l]`, shape `(α, T+1, q)`
    pub secondary_stock: Grid3<VarRef>,
}

/// The planning LP plus the data it was built from
///
/// Owns the solver model. There is exactly one instance per run; replicates
/// mutate it in place and restore it afterwards.
#[derive(Debug)]
pub struct PlanModel<L: LinearProgram> {
    lp: L,
    instance: PlanningInstance,
    vars: ModelVariables,
    scenario_availability: Grid3<f64>,
    /// Constraints in the fully built model
    constraint_count: usize,
}

impl<L: LinearProgram> PlanModel<L> {
    /// Build variables, objective and all constraints into `lp`
    ///
    /// # Errors
    /// - `ModelError::Instance` if the instance fails validation
    /// - `ModelError::ScenarioShape` / `NoScenarios` if the scenario table
    ///   does not match the instance
    /// - `ModelError::Lp` if the solver rejects a name
    pub fn build(
        instance: PlanningInstance,
        scenario_availability: Grid3<f64>,
        mut lp: L,
    ) -> Result<Self, ModelError> {
        instance.validate()?;

        let (alpha, periods, scenarios) = scenario_availability.dims();
        if scenarios == 0 {
            return Err(ModelError::NoScenarios);
        }
        if alpha != instance.num_secondary || periods != instance.num_periods {
            return Err(ModelError::ScenarioShape {
                expected: (instance.num_secondary, instance.num_periods),
                found: (alpha, periods, scenarios),
            });
        }

        let n = instance.num_products;
        let periods = instance.num_periods;
        let q = scenarios;
        let inf = f64::INFINITY;

        let inventory = Grid2::try_from_fn(n, periods + 1, |j, t| {
            lp.add_variable(&format!("x[{},{}]", j, t), 0.0, inf)
        })?;
        let production = Grid2::try_from_fn(n, periods, |j, t| {
            lp.add_variable(&format!("y[{},{}]", j, t), 0.0, inf)
        })?;
        let sales = Grid2::try_from_fn(n, periods, |j, t| {
            lp.add_variable(&format!("z[{},{}]", j, t), 0.0, inf)
        })?;
        let secondary_procurement = Grid3::try_from_fn(alpha, periods, q, |i, t, l| {
            lp.add_variable(&format!("v[{},{},{}]", i, t, l), 0.0, inf)
        })?;
        let primary_procurement = Grid3::try_from_fn(alpha, periods, q, |i, t, l| {
            lp.add_variable(&format!("w[{},{},{}]", i, t, l), 0.0, inf)
        })?;
        let secondary_stock = Grid3::try_from_fn(alpha, periods + 1, q, |i, t, l| {
            lp.add_variable(&format!("R[{},{},{}]", i, t, l), 0.0, inf)
        })?;

        let mut model = Self {
            lp,
            instance,
            vars: ModelVariables {
                inventory,
                production,
                sales,
                secondary_procurement,
                primary_procurement,
                secondary_stock,
            },
            scenario_availability,
            constraint_count: 0,
        };

        model.set_profit_objective();
        for spec in model.initial_constraints() {
            model.add(spec)?;
        }
        for period in 0..model.instance.num_periods {
            for spec in model.period_constraints(period) {
                model.add(spec)?;
            }
        }
        model.constraint_count = model.lp.constraint_names().len();

        Ok(model)
    }

    /// Build the expected-value or scenario-sampled model for `mode`
    pub fn for_mode(instance: PlanningInstance, mode: &PlanningMode, lp: L) -> Result<Self, ModelError> {
        instance.validate()?;
        let table = mode.scenario_table(&instance)?;
        Self::build(instance, table, lp)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn lp(&self) -> &L {
        &self.lp
    }

    pub(crate) fn lp_mut(&mut self) -> &mut L {
        &mut self.lp
    }

    pub fn instance(&self) -> &PlanningInstance {
        &self.instance
    }

    pub fn vars(&self) -> &ModelVariables {
        &self.vars
    }

    pub fn num_scenarios(&self) -> usize {
        self.scenario_availability.dims().2
    }

    /// Scenario availability table `A_l[i][t][l]`
    pub fn scenario_availability(&self) -> &Grid3<f64> {
        &self.scenario_availability
    }

    /// Number of constraints in the model as built, excluding any
    /// temporary optimality constraint
    pub fn constraint_count(&self) -> usize {
        self.constraint_count
    }

    // ========================================================================
    // Objective
    // ========================================================================

    /// Profit expression (the objective being maximized)
    pub fn profit_expr(&self) -> LinearExpr {
        let inst = &self.instance;
        let q = self.num_scenarios();
        let weight = 1.0 / q as f64;
        let mut expr = LinearExpr::new();
        for t in 0..inst.num_periods {
            for j in 0..inst.num_products {
                expr.add_term(self.vars.sales[(j, t)], inst.price[j]);
                expr.add_term(self.vars.production[(j, t)], -inst.production_cost[j]);
                expr.add_term(self.vars.inventory[(j, t + 1)], -inst.holding_cost[j]);
            }
            for l in 0..q {
                for i in inst.secondary_materials() {
                    expr.add_term(
                        self.vars.secondary_procurement[(i, t, l)],
                        -weight * inst.secondary_cost[i],
                    );
                    expr.add_term(
                        self.vars.primary_procurement[(i, t, l)],
                        -weight * inst.primary_cost[i],
                    );
                }
            }
        }
        expr
    }

    /// Install the maximize-profit objective
    pub fn set_profit_objective(&mut self) {
        let expr = self.profit_expr();
        self.lp.set_objective(expr, Direction::Maximize);
    }

    // ========================================================================
    // Constraints
    // ========================================================================

    /// Inventory initialization constraints (never pruned)
    pub fn initial_constraints(&self) -> Vec<ConstraintSpec> {
        let inst = &self.instance;
        let mut specs = Vec::new();
        for j in 0..inst.num_products {
            specs.push(ConstraintSpec::new(
                format!("InventoryInitProduct_{}", j),
                LinearExpr::new().with_term(self.vars.inventory[(j, 0)], 1.0),
                Sense::Eq,
                inst.initial_inventory[j],
            ));
        }
        for l in 0..self.num_scenarios() {
            for i in inst.secondary_materials() {
                specs.push(ConstraintSpec::new(
                    format!("InventoryInitSecondary_{}_{}", i, l),
                    LinearExpr::new().with_term(self.vars.secondary_stock[(i, 0, l)], 1.0),
                    Sense::Eq,
                    inst.initial_secondary_stock[i],
                ));
            }
        }
        specs
    }

    /// Every constraint scoped to `period`
    pub fn period_constraints(&self, period: usize) -> Vec<ConstraintSpec> {
        let inst = &self.instance;
        let vars = &self.vars;
        let t = period;
        let mut specs = Vec::new();

        for i in inst.fixed_materials() {
            let expr = (0..inst.num_products)
                .map(|j| (vars.production[(j, t)], inst.usage[i][j]))
                .collect();
            specs.push(ConstraintSpec::new(
                format!("ResourceConstraint_{}_{}", i, t),
                expr,
                Sense::Le,
                inst.capacity(i, t),
            ));
        }

        for j in 0..inst.num_products {
            let balance = LinearExpr::new()
                .with_term(vars.inventory[(j, t + 1)], 1.0)
                .with_term(vars.inventory[(j, t)], -1.0)
                .with_term(vars.production[(j, t)], -1.0)
                .with_term(vars.sales[(j, t)], 1.0);
            specs.push(ConstraintSpec::new(
                format!("InventoryBalanceProduct_{}_{}", j, t),
                balance,
                Sense::Eq,
                0.0,
            ));
            specs.push(ConstraintSpec::new(
                format!("SalesConstraint_{}_{}", j, t),
                LinearExpr::new().with_term(vars.sales[(j, t)], 1.0),
                Sense::Le,
                inst.demand[j][t],
            ));
        }

        for l in 0..self.num_scenarios() {
            for i in inst.secondary_materials() {
                let mut balance = LinearExpr::new()
                    .with_term(vars.secondary_stock[(i, t + 1, l)], 1.0)
                    .with_term(vars.secondary_stock[(i, t, l)], -1.0)
                    .with_term(vars.secondary_procurement[(i, t, l)], -1.0)
                    .with_term(vars.primary_procurement[(i, t, l)], -1.0);
                for j in 0..inst.num_products {
                    balance.add_term(vars.production[(j, t)], inst.usage[i][j]);
                }
                specs.push(ConstraintSpec::new(
                    format!("InventoryBalanceSecondary_{}_{}_{}", i, t, l),
                    balance,
                    Sense::Eq,
                    0.0,
                ));
                specs.push(ConstraintSpec::new(
                    format!("AvailabilityConstraint_{}_{}_{}", i, t, l),
                    LinearExpr::new().with_term(vars.secondary_procurement[(i, t, l)], 1.0),
                    Sense::Le,
                    self.scenario_availability[(i, t, l)],
                ));
            }
        }

        specs
    }

    /// Names of the constraints scoped to `period`
    pub fn period_constraint_names(&self, period: usize) -> Vec<String> {
        self.period_constraints(period)
            .into_iter()
            .map(|spec| spec.name)
            .collect()
    }

    pub(crate) fn add(&mut self, spec: ConstraintSpec) -> Result<(), LpError> {
        self.lp
            .add_constraint(&spec.name, spec.expr, spec.sense, spec.rhs)
            .map(|_| ())
    }

    /// Remove every constraint scoped to `period`
    ///
    /// # Errors
    /// `LpError::ConstraintNotFound` if one is already gone, which means
    /// prune/restore bookkeeping has drifted.
    pub(crate) fn prune_period(&mut self, period: usize) -> Result<(), LpError> {
        for name in self.period_constraint_names(period) {
            self.lp.remove_constraint(&name)?;
        }
        Ok(())
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// Collapse the bounds of `var` to the single value `value`
    pub(crate) fn fix(&mut self, var: VarRef, value: f64) -> Result<(), LpError> {
        self.lp.set_bounds(var, value, value)
    }

    /// Variables whose bounds the simulator may fix: everything indexed by a
    /// flow period, plus end-of-period stocks `x[j,t+1]` and `R[i,t+1,l]`
    pub fn period_scoped_variables(&self) -> Vec<VarRef> {
        let inst = &self.instance;
        let vars = &self.vars;
        let mut scoped = Vec::new();
        for t in 0..inst.num_periods {
            for j in 0..inst.num_products {
                scoped.push(vars.inventory[(j, t + 1)]);
                scoped.push(vars.production[(j, t)]);
                scoped.push(vars.sales[(j, t)]);
            }
            for l in 0..self.num_scenarios() {
                for i in inst.secondary_materials() {
                    scoped.push(vars.secondary_stock[(i, t + 1, l)]);
                    scoped.push(vars.secondary_procurement[(i, t, l)]);
                    scoped.push(vars.primary_procurement[(i, t, l)]);
                }
            }
        }
        scoped
    }

    /// Reset every period-scoped variable to `[0, ∞)`
    pub(crate) fn release_bounds(&mut self) -> Result<(), LpError> {
        for var in self.period_scoped_variables() {
            self.lp.set_bounds(var, 0.0, f64::INFINITY)?;
        }
        Ok(())
    }

    /// `(variable, value)` pairs a fixing record collapses to `LB = UB`
    ///
    /// Material values are imposed on every scenario copy: from the next
    /// period on all scenarios share one realized path.
    pub fn fixing_bounds(&self, record: &FixingRecord) -> Vec<(VarRef, f64)> {
        let vars = &self.vars;
        let t = record.period;
        let mut bounds = Vec::new();
        for product in &record.products {
            let j = product.product;
            bounds.push((vars.inventory[(j, t + 1)], product.end_inventory));
            bounds.push((vars.production[(j, t)], product.production));
            bounds.push((vars.sales[(j, t)], product.sales));
        }
        for material in &record.materials {
            let i = material.material;
            for l in 0..self.num_scenarios() {
                bounds.push((vars.secondary_procurement[(i, t, l)], material.secondary));
                bounds.push((vars.primary_procurement[(i, t, l)], material.primary));
                bounds.push((vars.secondary_stock[(i, t + 1, l)], material.carried_stock));
            }
        }
        bounds
    }

    pub(crate) fn apply_fixing(&mut self, record: &FixingRecord) -> Result<(), LpError> {
        for (var, value) in self.fixing_bounds(record) {
            self.fix(var, value)?;
        }
        Ok(())
    }

    /// Return the model to the state [`PlanModel::build`] left it in
    ///
    /// `pruned` lists the periods whose constraints were removed since the
    /// last restore; exactly those are re-added. All period-scoped bounds
    /// go back to `[0, ∞)` and the profit objective is reinstalled.
    ///
    /// # Errors
    /// - `ModelError::Lp` (`DuplicateConstraint`) if a constraint of a
    ///   pruned period is already present
    /// - `ModelError::ConstraintCount` if the constraint set still differs
    ///   in size from the built model, e.g. a constraint removed outside
    ///   pruning or a leftover optimality constraint
    pub(crate) fn restore(&mut self, pruned: &[usize]) -> Result<(), ModelError> {
        self.release_bounds()?;
        for &period in pruned {
            for spec in self.period_constraints(period) {
                self.add(spec)?;
            }
        }
        self.set_profit_objective();

        let found = self.lp.constraint_names().len();
        if found != self.constraint_count {
            return Err(ModelError::ConstraintCount {
                expected: self.constraint_count,
                found,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Solution
    // ========================================================================

    /// Copy all decision values out of the last optimal solve
    pub fn read_plan(&self) -> Result<SolvedPlan, LpError> {
        let lp = &self.lp;
        let vars = &self.vars;
        let read2 = |grid: &Grid2<VarRef>| {
            Grid2::try_from_fn(grid.rows(), grid.cols(), |r, c| lp.value(grid[(r, c)]))
        };
        let read3 = |grid: &Grid3<VarRef>| {
            let (a, b, c) = grid.dims();
            Grid3::try_from_fn(a, b, c, |i, j, k| lp.value(grid[(i, j, k)]))
        };
        Ok(SolvedPlan {
            objective: lp.objective_value()?,
            inventory: read2(&vars.inventory)?,
            production: read2(&vars.production)?,
            sales: read2(&vars.sales)?,
            secondary_procurement: read3(&vars.secondary_procurement)?,
            primary_procurement: read3(&vars.primary_procurement)?,
            secondary_stock: read3(&vars.secondary_stock)?,
        })
    }
}
