//! Variable fixing policy
//!
//! Turns a just-solved plan and a realized availability draw into the
//! quantities that actually happen in period `τ`:
//!
//! - **Products**: production and sales are taken from the plan as-is;
//!   end inventory is `max(0, x[j,τ] + y[j,τ] − z[j,τ])`. The `max` absorbs
//!   small negative values from solver tolerance.
//! - **Secondary materials**: with `sum_req` the planned consumption from
//!   `τ` to the horizon end and `R` the stock entering `τ`:
//!   - if `R + realized_A ≤ sum_req` the material is scarce and all of
//!     `realized_A` is bought;
//!   - otherwise only `max(0, sum_req − R)` is bought.
//!
//!   The primary substitute covers whatever the current period still lacks:
//!   `max(0, consumption_τ − R − realized_v)`.
//!
//! Everything here is pure; the simulator applies the resulting
//! [`FixingRecord`] to the model as `LB = UB` bounds.

use crate::core::PlanningInstance;
use crate::model::SolvedPlan;
use serde::{Deserialize, Serialize};

/// Realized flows of one product in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFixing {
    pub product: usize,
    pub production: f64,
    pub sales: f64,
    /// Inventory carried into the next period, clamped at zero
    pub end_inventory: f64,
    /// `p·z − k·y − h·end_inventory`
    pub margin: f64,
}

/// Realized recourse purchase of one secondary material in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecourse {
    pub material: usize,
    /// Sampled availability `realized_A`
    pub available: f64,
    /// Secondary procurement `realized_v`
    pub secondary: f64,
    /// Primary-substitute procurement `realized_w`
    pub primary: f64,
    /// Stock carried into the next period
    pub carried_stock: f64,
    /// `b·realized_v + c·realized_w`
    pub cost: f64,
}

/// Everything fixed for one period of one replicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixingRecord {
    pub period: usize,
    pub products: Vec<ProductFixing>,
    pub materials: Vec<MaterialRecourse>,
}

impl FixingRecord {
    /// Product contribution of the period before material costs
    pub fn product_margin(&self) -> f64 {
        self.products.iter().map(|p| p.margin).sum()
    }

    /// Secondary plus primary recourse cost of the period
    pub fn material_cost(&self) -> f64 {
        self.materials.iter().map(|m| m.cost).sum()
    }
}

/// Realize product `product` in `period` from the plan
pub fn fix_product(
    instance: &PlanningInstance,
    plan: &SolvedPlan,
    product: usize,
    period: usize,
) -> ProductFixing {
    let start = plan.inventory[(product, period)];
    let production = plan.production[(product, period)];
    let sales = plan.sales[(product, period)];
    let end_inventory = (start + production - sales).max(0.0);

    ProductFixing {
        product,
        production,
        sales,
        end_inventory,
        margin: instance.price[product] * sales
            - instance.production_cost[product] * production
            - instance.holding_cost[product] * end_inventory,
    }
}

/// Recourse quantities `(realized_v, realized_w)` for one material
///
/// # Arguments
/// * `stock` - Stock entering the period (`R[i,τ]`)
/// * `available` - Sampled availability (`realized_A`)
/// * `remaining_requirement` - Planned consumption from `τ` to the end
/// * `period_requirement` - Planned consumption in `τ`
///
/// # Example
/// ```
/// use mps_simulator_core::policy::recourse_quantities;
///
/// // Scarce: 2 in stock + 3 available < 10 needed, take everything
/// assert_eq!(recourse_quantities(2.0, 3.0, 10.0, 6.0), (3.0, 1.0));
/// // Plenty: buy only what the look-ahead still needs
/// assert_eq!(recourse_quantities(2.0, 30.0, 10.0, 6.0), (8.0, 0.0));
/// ```
pub fn recourse_quantities(
    stock: f64,
    available: f64,
    remaining_requirement: f64,
    period_requirement: f64,
) -> (f64, f64) {
    let secondary = if stock + available <= remaining_requirement {
        available
    } else {
        (remaining_requirement - stock).max(0.0)
    };
    let primary = (period_requirement - stock - secondary).max(0.0);
    (secondary, primary)
}

/// Realize secondary material `material` in `period`
///
/// `stock` is the stock entering the period: the solved `R[i,τ,0]` in the
/// rolling simulation, a locally tracked value in the open-loop one.
pub fn material_recourse(
    instance: &PlanningInstance,
    plan: &SolvedPlan,
    material: usize,
    period: usize,
    stock: f64,
    available: f64,
) -> MaterialRecourse {
    let remaining = plan.remaining_requirement(instance, material, period);
    let consumption = plan.material_requirement(instance, material, period);
    let (secondary, primary) = recourse_quantities(stock, available, remaining, consumption);

    MaterialRecourse {
        material,
        available,
        secondary,
        primary,
        carried_stock: stock + secondary + primary - consumption,
        cost: instance.secondary_cost[material] * secondary
            + instance.primary_cost[material] * primary,
    }
}

/// Build the complete fixing record for `period`
///
/// `realized` holds one availability draw per secondary material, in
/// material order. Stock entering the period is read from the plan's first
/// scenario, which all scenarios share once earlier periods are fixed.
pub fn plan_fixings(
    instance: &PlanningInstance,
    plan: &SolvedPlan,
    period: usize,
    realized: &[f64],
) -> FixingRecord {
    let products = (0..instance.num_products)
        .map(|j| fix_product(instance, plan, j, period))
        .collect();
    let materials = instance
        .secondary_materials()
        .map(|i| {
            let stock = plan.secondary_stock[(i, period, 0)];
            material_recourse(instance, plan, i, period, stock, realized[i])
        })
        .collect();

    FixingRecord {
        period,
        products,
        materials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_cover_is_scarce_branch() {
        // R + A == sum_req takes the scarce branch and buys everything
        assert_eq!(recourse_quantities(4.0, 6.0, 10.0, 5.0), (6.0, 0.0));
    }

    #[test]
    fn test_stock_exceeding_requirement_buys_nothing() {
        assert_eq!(recourse_quantities(12.0, 5.0, 10.0, 5.0), (0.0, 0.0));
    }

    #[test]
    fn test_primary_covers_current_shortfall_only() {
        // 0 stock, 1 available, 10 needed overall, 4 needed now
        let (v, w) = recourse_quantities(0.0, 1.0, 10.0, 4.0);
        assert_eq!(v, 1.0);
        assert_eq!(w, 3.0);
    }
}
