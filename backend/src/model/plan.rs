//! Solved-plan snapshots
//!
//! A [`SolvedPlan`] copies every decision value out of the LP after an
//! optimal solve. The fixing policy, the open-loop simulation and the
//! report all work on snapshots, so they never read the live model while
//! the simulator is mutating it.

use crate::core::{Grid2, Grid3, PlanningInstance};
use serde::{Deserialize, Serialize};

/// Decision values of one optimal solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvedPlan {
    /// Objective value reported by the solver
    pub objective: f64,

    /// Product inventory `x[j,t]`, `t ∈ 0..=T`
    pub inventory: Grid2<f64>,

    /// Production `y[j,t]`
    pub production: Grid2<f64>,

    /// Sales `z[j,t]`
    pub sales: Grid2<f64>,

    /// Secondary procurement `v[i,t,l]`
    pub secondary_procurement: Grid3<f64>,

    /// Primary-substitute procurement `w[i,t,l]`
    pub primary_procurement: Grid3<f64>,

    /// Secondary stock `R[i,t,l]`, `t ∈ 0..=T`
    pub secondary_stock: Grid3<f64>,
}

impl SolvedPlan {
    pub fn num_scenarios(&self) -> usize {
        self.secondary_stock.dims().2
    }

    /// Consumption of secondary `material` in `period`: `Σ_j a[i][j]·y[j,t]`
    pub fn material_requirement(
        &self,
        instance: &PlanningInstance,
        material: usize,
        period: usize,
    ) -> f64 {
        (0..instance.num_products)
            .map(|j| instance.usage[material][j] * self.production[(j, period)])
            .sum()
    }

    /// Planned consumption of `material` from `from` to the end of the horizon
    pub fn remaining_requirement(
        &self,
        instance: &PlanningInstance,
        material: usize,
        from: usize,
    ) -> f64 {
        (from..instance.num_periods)
            .map(|t| self.material_requirement(instance, material, t))
            .sum()
    }

    /// `Σ_{j,t} p_j z − k_j y − h_j x[j,t+1]`
    pub fn product_margin(&self, instance: &PlanningInstance) -> f64 {
        let mut margin = 0.0;
        for j in 0..instance.num_products {
            for t in 0..instance.num_periods {
                margin += instance.price[j] * self.sales[(j, t)]
                    - instance.production_cost[j] * self.production[(j, t)]
                    - instance.holding_cost[j] * self.inventory[(j, t + 1)];
            }
        }
        margin
    }

    /// Scenario mean of `v[i,t,·]`
    pub fn mean_secondary_procurement(&self, material: usize, period: usize) -> f64 {
        mean(self.secondary_procurement.lane(material, period))
    }

    /// Scenario mean of `w[i,t,·]`
    pub fn mean_primary_procurement(&self, material: usize, period: usize) -> f64 {
        mean(self.primary_procurement.lane(material, period))
    }

    /// Scenario mean of `R[i,t,·]`
    pub fn mean_secondary_stock(&self, material: usize, period: usize) -> f64 {
        mean(self.secondary_stock.lane(material, period))
    }

    /// Profit with scenario-averaged material cost; equals the LP objective
    /// up to solver tolerance
    pub fn profit(&self, instance: &PlanningInstance) -> f64 {
        let mut material_cost = 0.0;
        for i in instance.secondary_materials() {
            for t in 0..instance.num_periods {
                material_cost += instance.secondary_cost[i] * self.mean_secondary_procurement(i, t)
                    + instance.primary_cost[i] * self.mean_primary_procurement(i, t);
            }
        }
        self.product_margin(instance) - material_cost
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
