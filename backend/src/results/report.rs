//! Run report
//!
//! Everything a run produces, in one serializable value: the headline
//! contribution margins, per-variant statistics, the initial plan's product
//! and material tables, and per-product service levels.

use super::aggregator::{AggregateStats, ReplicateFailure, ResultAggregator};
use crate::core::PlanningInstance;
use crate::model::SolvedPlan;
use crate::orchestrator::{SimulationConfig, SimulationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use uuid::Uuid;

/// Slack when comparing supply against demand for service levels
const SERVICE_TOLERANCE: f64 = 1e-9;

/// Headline contribution margins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "predicted_CM")]
    pub predicted_cm: f64,
    #[serde(rename = "realized_CM_open_loop")]
    pub realized_cm_open_loop: f64,
    #[serde(rename = "realized_CM_rolling")]
    pub realized_cm_rolling: f64,
}

/// Initial-plan values of one product in one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub product: usize,
    pub period: usize,
    pub inventory: f64,
    pub production: f64,
    pub sales: f64,
    pub demand: f64,
}

/// Initial-plan values of one secondary material in one period, scenario means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRow {
    pub material: usize,
    pub period: usize,
    pub inventory: f64,
    pub secondary_procurement: f64,
    pub primary_procurement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,

    /// SHA-256 of the planning instance
    pub fingerprint: String,

    pub num_simulations: usize,
    pub epsilon: f64,

    pub summary: Summary,

    pub open_loop: Option<AggregateStats>,
    pub rolling: Option<AggregateStats>,
    pub rolling_failures: Vec<ReplicateFailure>,

    pub products: Vec<ProductRow>,
    pub materials: Vec<MaterialRow>,

    /// Fraction of periods with `x + y ≥ d`, per product
    pub service_levels: Vec<f64>,

    /// Plan profit with scenario-averaged material cost
    pub total_contribution_margin: f64,
}

impl RunReport {
    /// Assemble the report of a completed run
    ///
    /// # Errors
    /// `NoSuccessfulReplicates` if either simulation produced no result.
    pub fn build(
        instance: &PlanningInstance,
        config: &SimulationConfig,
        plan: &SolvedPlan,
        open_loop: &ResultAggregator,
        rolling: &ResultAggregator,
    ) -> Result<Self, SimulationError> {
        let realized_cm_open_loop = open_loop
            .mean()
            .ok_or(SimulationError::NoSuccessfulReplicates("open-loop"))?;
        let realized_cm_rolling = rolling
            .mean()
            .ok_or(SimulationError::NoSuccessfulReplicates("rolling"))?;

        let mut products = Vec::with_capacity(instance.num_products * instance.num_periods);
        for j in 0..instance.num_products {
            for t in 0..instance.num_periods {
                products.push(ProductRow {
                    product: j,
                    period: t,
                    inventory: plan.inventory[(j, t)],
                    production: plan.production[(j, t)],
                    sales: plan.sales[(j, t)],
                    demand: instance.demand[j][t],
                });
            }
        }

        let mut materials = Vec::with_capacity(instance.num_secondary * instance.num_periods);
        for i in instance.secondary_materials() {
            for t in 0..instance.num_periods {
                materials.push(MaterialRow {
                    material: i,
                    period: t,
                    inventory: plan.mean_secondary_stock(i, t),
                    secondary_procurement: plan.mean_secondary_procurement(i, t),
                    primary_procurement: plan.mean_primary_procurement(i, t),
                });
            }
        }

        Ok(Self {
            run_id: Uuid::new_v4(),
            fingerprint: instance.fingerprint(),
            num_simulations: config.num_simulations,
            epsilon: config.epsilon,
            summary: Summary {
                predicted_cm: plan.objective,
                realized_cm_open_loop,
                realized_cm_rolling,
            },
            open_loop: open_loop.stats(),
            rolling: rolling.stats(),
            rolling_failures: rolling.failures().to_vec(),
            products,
            materials,
            service_levels: service_levels(instance, plan),
            total_contribution_margin: plan.profit(instance),
        })
    }

    /// Headline values keyed by their report names
    pub fn summary_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("predicted_CM", self.summary.predicted_cm),
            ("realized_CM_open_loop", self.summary.realized_cm_open_loop),
            ("realized_CM_rolling", self.summary.realized_cm_rolling),
        ])
    }

    /// Tabular text report
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, f: &mut String) -> std::fmt::Result {
        writeln!(f, "Optimal circular master production schedule")?;
        writeln!(f)?;
        writeln!(f, "Run {}  instance {}", self.run_id, self.fingerprint)?;
        writeln!(f)?;

        let rule = "-".repeat(60);
        writeln!(f, "{}", rule)?;
        writeln!(f, " Product | Period | Inventory | Production | Sales | Demand ")?;
        writeln!(f, "{}", rule)?;
        for row in &self.products {
            writeln!(
                f,
                "{:8} | {:6} | {:9.2} | {:10.2} | {:5.2} | {:6.2} ",
                row.product + 1,
                row.period + 1,
                row.inventory,
                row.production,
                row.sales,
                row.demand
            )?;
        }
        writeln!(f)?;

        let rule = "-".repeat(81);
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            " Secondary m. | Period |  Inventory | Procurement sec. m. | Procurement prim. m. "
        )?;
        writeln!(f, "{}", rule)?;
        for row in &self.materials {
            writeln!(
                f,
                "{:13} | {:6} | {:10.2} | {:19.2} | {:20.2} ",
                row.material + 1,
                row.period + 1,
                row.inventory,
                row.secondary_procurement,
                row.primary_procurement
            )?;
        }
        writeln!(f)?;

        for (j, level) in self.service_levels.iter().enumerate() {
            writeln!(f, "Service level for product {}: {:.4}", j + 1, level)?;
        }
        writeln!(f, "Total contribution margin: {:.4}", self.total_contribution_margin)?;
        writeln!(f)?;

        for (key, value) in self.summary_map() {
            writeln!(f, "{}: {:.4}", key, value)?;
        }
        for (label, stats) in [("open-loop", &self.open_loop), ("rolling", &self.rolling)] {
            if let Some(s) = stats {
                writeln!(
                    f,
                    "{} over {} replicates: mean {:.4}, std {:.4}, min {:.4}, p10 {:.4}, p50 {:.4}, p90 {:.4}, max {:.4}",
                    label, s.count, s.mean, s.std_dev, s.min, s.percentile_10, s.percentile_50, s.percentile_90, s.max
                )?;
            }
        }
        for failure in &self.rolling_failures {
            writeln!(f, "rolling replicate {} failed: {}", failure.replicate, failure.reason)?;
        }
        Ok(())
    }
}

/// `|{t : x[j,t] + y[j,t] ≥ d[j][t]}| / T` for every product
pub fn service_levels(instance: &PlanningInstance, plan: &SolvedPlan) -> Vec<f64> {
    (0..instance.num_products)
        .map(|j| {
            let fulfilled = (0..instance.num_periods)
                .filter(|&t| {
                    plan.inventory[(j, t)] + plan.production[(j, t)]
                        >= instance.demand[j][t] - SERVICE_TOLERANCE
                })
                .count();
            fulfilled as f64 / instance.num_periods as f64
        })
        .collect()
}
