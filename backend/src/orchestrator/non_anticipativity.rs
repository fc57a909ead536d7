//! Non-anticipativity adjustment
//!
//! An optimal plan is often one of many. Some of them postpone secondary
//! purchases and count on availability in later periods that has not been
//! observed yet. Before committing a period, the adjuster re-solves for the
//! optimal plan that buys secondary material as early as it can:
//!
//! ```text
//! min  Σ_t (1+ε)^t · Σ_{i,l} v[i,t,l]
//! s.t. original constraints
//!      profit = f*                            (OptimalityConstraint)
//! ```
//!
//! The surrogate does not price primary-substitute purchases, so any room
//! below `f*` would be spent swapping secondary for primary material. The
//! pin is therefore exact. Only if the exact pin is infeasible, which can
//! happen through solver round-off, is it retried as
//! `profit ≥ f* − tol·max(1, |f*|)` with a small noise floor `tol`.
//!
//! The temporary constraint is removed and the maximize-profit objective
//! reinstalled before `adjust` returns, whatever the re-solve's outcome. If
//! the re-solve is not optimal the original plan is used.

use crate::lp::{Direction, LinearExpr, LinearProgram, Sense, SolveStatus};
use crate::model::{ConstraintSpec, PlanModel, SolvedPlan, OPTIMALITY_CONSTRAINT};
use crate::orchestrator::SimulationError;
use tracing::{debug, warn};

/// Result of one adjustment
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    /// Plan to commit from; `objective` is its profit
    pub plan: SolvedPlan,
    /// `true` if `plan` is the re-solved one
    pub adjusted: bool,
    /// Status of the last re-solve
    pub status: SolveStatus,
    /// Profit of the original solve
    pub f_star: f64,
}

/// Re-solves toward a plan that secures secondary material early
#[derive(Debug, Clone, PartialEq)]
pub struct NonAnticipativityAdjuster {
    epsilon: f64,
    tolerance: f64,
}

impl NonAnticipativityAdjuster {
    /// # Arguments
    /// * `epsilon` - Per-period growth of the surrogate weights
    /// * `tolerance` - Relative noise floor below `f*`, used only when the
    ///   exact profit pin is infeasible
    pub fn new(epsilon: f64, tolerance: f64) -> Self {
        Self { epsilon, tolerance }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Absolute noise floor below `f_star`
    pub fn slack(&self, f_star: f64) -> f64 {
        self.tolerance * f_star.abs().max(1.0)
    }

    /// `Σ_t (1+ε)^t · Σ_{i,l} v[i,t,l]`
    pub fn surrogate_objective<L: LinearProgram>(&self, model: &PlanModel<L>) -> LinearExpr {
        let instance = model.instance();
        let vars = model.vars();
        let mut expr = LinearExpr::new();
        for t in 0..instance.num_periods {
            let weight = (1.0 + self.epsilon).powi(t as i32);
            for l in 0..model.num_scenarios() {
                for i in instance.secondary_materials() {
                    expr.add_term(vars.secondary_procurement[(i, t, l)], weight);
                }
            }
        }
        expr
    }

    /// Re-solve `model` around `original`, the plan of its last optimal solve
    pub fn adjust<L: LinearProgram>(
        &self,
        model: &mut PlanModel<L>,
        original: SolvedPlan,
    ) -> Result<Adjustment, SimulationError> {
        let f_star = original.objective;

        let mut status = self.resolve_pinned(model, Sense::Eq, f_star)?;
        if status == SolveStatus::Infeasible && self.tolerance > 0.0 {
            debug!(f_star, "exact profit pin infeasible, retrying with noise floor");
            status = self.resolve_pinned(model, Sense::Ge, f_star - self.slack(f_star))?;
        }

        // Values of the last solve stay readable after the objective changes
        model.set_profit_objective();

        if status.is_optimal() {
            let mut plan = model.read_plan()?;
            plan.objective = plan.profit(model.instance());
            Ok(Adjustment {
                plan,
                adjusted: true,
                status,
                f_star,
            })
        } else {
            warn!(%status, "non-anticipativity re-solve failed, keeping original solution");
            Ok(Adjustment {
                plan: original,
                adjusted: false,
                status,
                f_star,
            })
        }
    }

    /// Minimize the surrogate with `profit <sense> rhs` in place, then drop
    /// the pin again
    fn resolve_pinned<L: LinearProgram>(
        &self,
        model: &mut PlanModel<L>,
        sense: Sense,
        rhs: f64,
    ) -> Result<SolveStatus, SimulationError> {
        let profit = model.profit_expr();
        model.add(ConstraintSpec {
            name: OPTIMALITY_CONSTRAINT.to_string(),
            expr: profit,
            sense,
            rhs,
        })?;
        let surrogate = self.surrogate_objective(model);
        model.lp_mut().set_objective(surrogate, Direction::Minimize);

        let status = model.lp_mut().optimize();
        model.lp_mut().remove_constraint(OPTIMALITY_CONSTRAINT)?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlanningInstance;
    use crate::lp::MicroLpModel;
    use crate::model::PlanningMode;

    /// Secondary stock is free to hold, so any split of the 7 units between
    /// the two periods with `v[0] ≥ 2` is optimal
    fn tie_instance() -> PlanningInstance {
        PlanningInstance {
            num_products: 1,
            num_materials: 1,
            num_secondary: 1,
            num_periods: 2,
            price: vec![10.0],
            production_cost: vec![2.0],
            holding_cost: vec![1.0],
            demand: vec![vec![2.0, 5.0]],
            initial_inventory: vec![0.0],
            usage: vec![vec![1.0]],
            secondary_cost: vec![1.0],
            primary_cost: vec![3.0],
            availability: vec![vec![10.0, 10.0]],
            initial_secondary_stock: vec![0.0],
            fixed_capacity: vec![],
        }
    }

    fn solved_model() -> (PlanModel<MicroLpModel>, SolvedPlan) {
        let mut model =
            PlanModel::for_mode(tie_instance(), &PlanningMode::ExpectedValue, MicroLpModel::new())
                .unwrap();
        assert!(model.lp_mut().optimize().is_optimal());
        let plan = model.read_plan().unwrap();
        (model, plan)
    }

    #[test]
    fn test_slack_scales_with_objective() {
        let adjuster = NonAnticipativityAdjuster::new(0.1, 1e-6);
        assert_eq!(adjuster.slack(0.5), 1e-6);
        assert!((adjuster.slack(-2_000.0) - 2e-3).abs() < 1e-15);
    }

    #[test]
    fn test_surrogate_weights_grow_per_period() {
        let (model, _) = solved_model();
        let adjuster = NonAnticipativityAdjuster::new(0.5, 1e-6);
        let surrogate = adjuster.surrogate_objective(&model);
        let v = &model.vars().secondary_procurement;

        let weight = |var| {
            surrogate
                .terms()
                .iter()
                .find(|(term, _)| *term == var)
                .map(|(_, c)| *c)
        };
        assert_eq!(weight(v[(0, 0, 0)]), Some(1.0));
        assert_eq!(weight(v[(0, 1, 0)]), Some(1.5));
        assert_eq!(surrogate.terms().len(), 2);
    }

    #[test]
    fn test_adjusted_plan_buys_early_at_same_profit() {
        let (mut model, original) = solved_model();
        assert!((original.objective - 49.0).abs() < 1e-6);

        let adjuster = NonAnticipativityAdjuster::new(0.1, 1e-6);
        let adjustment = adjuster.adjust(&mut model, original).unwrap();

        assert!(adjustment.adjusted);
        assert_eq!(adjustment.status, SolveStatus::Optimal);
        let plan = &adjustment.plan;
        assert!((plan.secondary_procurement[(0, 0, 0)] - 7.0).abs() < 1e-6);
        assert!(plan.secondary_procurement[(0, 1, 0)].abs() < 1e-6);
        assert!(plan.primary_procurement[(0, 0, 0)].abs() < 1e-6);
        assert!((plan.objective - adjustment.f_star).abs() < 1e-6);
    }

    #[test]
    fn test_loose_tolerance_does_not_trade_profit_for_surrogate() {
        // A 10% floor would leave ~4.9 of profit for swapping v into w
        let (mut model, original) = solved_model();
        let adjustment = NonAnticipativityAdjuster::new(0.1, 0.1)
            .adjust(&mut model, original)
            .unwrap();

        assert!(adjustment.adjusted);
        let plan = &adjustment.plan;
        assert!((plan.objective - 49.0).abs() < 1e-6);
        assert!(plan.primary_procurement.iter().all(|w| w.abs() < 1e-6));
        assert!((plan.secondary_procurement[(0, 0, 0)] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_model_reverted_after_adjust() {
        let (mut model, original) = solved_model();
        let f_star = original.objective;
        let names_before = model.lp().constraint_names();

        NonAnticipativityAdjuster::new(0.1, 1e-6)
            .adjust(&mut model, original)
            .unwrap();

        assert_eq!(model.lp().constraint_names(), names_before);
        assert!(model.lp_mut().optimize().is_optimal());
        assert!((model.lp().objective_value().unwrap() - f_star).abs() < 1e-6);
    }

    #[test]
    fn test_failed_resolve_keeps_original() {
        let (mut model, mut original) = solved_model();
        // Unreachable profit target makes the pinned re-solve infeasible
        original.objective = 1_000.0;

        let adjustment = NonAnticipativityAdjuster::new(0.1, 1e-6)
            .adjust(&mut model, original.clone())
            .unwrap();

        assert!(!adjustment.adjusted);
        assert_eq!(adjustment.status, SolveStatus::Infeasible);
        assert_eq!(adjustment.plan, original);
        assert!(!model.lp().has_constraint(OPTIMALITY_CONSTRAINT));
    }
}
