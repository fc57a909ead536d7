//! Planning instance
//!
//! Holds the immutable data of one master production scheduling problem:
//! products, materials (secondary first, then fixed), periods and the usage
//! matrix linking them.
//!
//! # Critical Invariants
//!
//! 1. Secondary materials occupy indices `[0, num_secondary)`, fixed
//!    materials `[num_secondary, num_materials)`
//! 2. Every per-period vector has exactly `num_periods` entries
//! 3. All costs, demands, capacities and availabilities are finite and
//!    non-negative
//!
//! Call [`PlanningInstance::validate`] after deserializing; the model
//! builder refuses instances that fail it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Range;
use thiserror::Error;

/// Instance validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstanceError {
    #[error("Instance must have at least one {0}")]
    Empty(&'static str),

    #[error("Secondary material count {secondary} exceeds material count {materials}")]
    TooManySecondary { secondary: usize, materials: usize },

    #[error("{field}: expected length {expected}, found {actual}")]
    DimensionMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("{field} must be finite and non-negative, got {value}")]
    InvalidValue { field: String, value: f64 },
}

/// Complete data of a planning instance
///
/// Field names follow the usual notation: `p` price, `k` production cost,
/// `h` holding cost, `d` demand, `x_a` initial inventory, `a` usage, `b`
/// secondary cost, `c` primary-substitute cost, `A` availability, `R_a`
/// initial secondary stock, `R_fix` fixed capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningInstance {
    /// Number of products `n`
    pub num_products: usize,

    /// Number of materials `m` (secondary + fixed)
    pub num_materials: usize,

    /// Number of secondary materials `α`
    pub num_secondary: usize,

    /// Planning horizon `T`
    pub num_periods: usize,

    /// Sale price per product (`p_j`)
    pub price: Vec<f64>,

    /// Unit production cost per product (`k_j`)
    pub production_cost: Vec<f64>,

    /// Unit holding cost per product and period (`h_j`)
    pub holding_cost: Vec<f64>,

    /// Demand `d[j][t]`
    pub demand: Vec<Vec<f64>>,

    /// Inventory of each product before period 0 (`x_a_j`)
    pub initial_inventory: Vec<f64>,

    /// Usage `a[i][j]`: units of material `i` per unit of product `j`
    pub usage: Vec<Vec<f64>>,

    /// Unit cost of secondary material (`b_i`, one per secondary material)
    pub secondary_cost: Vec<f64>,

    /// Unit cost of the primary substitute (`c_i`, one per secondary material)
    pub primary_cost: Vec<f64>,

    /// Nominal availability `A[i][t]` of each secondary material
    pub availability: Vec<Vec<f64>>,

    /// Secondary stock before period 0 (`R_a_i`)
    pub initial_secondary_stock: Vec<f64>,

    /// Capacity `R_fix[i - α][t]` of each fixed material
    pub fixed_capacity: Vec<Vec<f64>>,
}

impl PlanningInstance {
    /// Check dimensions and value ranges
    pub fn validate(&self) -> Result<(), InstanceError> {
        let n = self.num_products;
        let t = self.num_periods;
        let alpha = self.num_secondary;

        if n == 0 {
            return Err(InstanceError::Empty("product"));
        }
        if t == 0 {
            return Err(InstanceError::Empty("period"));
        }
        if alpha > self.num_materials {
            return Err(InstanceError::TooManySecondary {
                secondary: alpha,
                materials: self.num_materials,
            });
        }

        check_vector("price", &self.price, n)?;
        check_vector("production_cost", &self.production_cost, n)?;
        check_vector("holding_cost", &self.holding_cost, n)?;
        check_vector("initial_inventory", &self.initial_inventory, n)?;
        check_matrix("demand", &self.demand, n, t)?;

        check_matrix("usage", &self.usage, self.num_materials, n)?;

        check_vector("secondary_cost", &self.secondary_cost, alpha)?;
        check_vector("primary_cost", &self.primary_cost, alpha)?;
        check_vector("initial_secondary_stock", &self.initial_secondary_stock, alpha)?;
        check_matrix("availability", &self.availability, alpha, t)?;

        check_matrix(
            "fixed_capacity",
            &self.fixed_capacity,
            self.num_materials - alpha,
            t,
        )?;

        Ok(())
    }

    /// Indices of secondary materials (`I_A`)
    pub fn secondary_materials(&self) -> Range<usize> {
        0..self.num_secondary
    }

    /// Indices of fixed materials (`I \ I_A`)
    pub fn fixed_materials(&self) -> Range<usize> {
        self.num_secondary..self.num_materials
    }

    /// Capacity of fixed material `material` in `period`
    pub fn capacity(&self, material: usize, period: usize) -> f64 {
        self.fixed_capacity[material - self.num_secondary][period]
    }

    /// SHA-256 of the canonical JSON encoding, hex encoded
    ///
    /// Identifies the instance in reports.
    pub fn fingerprint(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        format!("{:x}", digest)
    }
}

fn check_vector(field: &str, values: &[f64], expected: usize) -> Result<(), InstanceError> {
    if values.len() != expected {
        return Err(InstanceError::DimensionMismatch {
            field: field.to_string(),
            expected,
            actual: values.len(),
        });
    }
    for (idx, &value) in values.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(InstanceError::InvalidValue {
                field: format!("{}[{}]", field, idx),
                value,
            });
        }
    }
    Ok(())
}

fn check_matrix(
    field: &str,
    rows: &[Vec<f64>],
    expected_rows: usize,
    expected_cols: usize,
) -> Result<(), InstanceError> {
    if rows.len() != expected_rows {
        return Err(InstanceError::DimensionMismatch {
            field: field.to_string(),
            expected: expected_rows,
            actual: rows.len(),
        });
    }
    for (idx, row) in rows.iter().enumerate() {
        check_vector(&format!("{}[{}]", field, idx), row, expected_cols)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> PlanningInstance {
        PlanningInstance {
            num_products: 1,
            num_materials: 2,
            num_secondary: 1,
            num_periods: 2,
            price: vec![10.0],
            production_cost: vec![2.0],
            holding_cost: vec![1.0],
            demand: vec![vec![5.0, 5.0]],
            initial_inventory: vec![0.0],
            usage: vec![vec![1.0], vec![2.0]],
            secondary_cost: vec![1.0],
            primary_cost: vec![3.0],
            availability: vec![vec![5.0, 5.0]],
            initial_secondary_stock: vec![0.0],
            fixed_capacity: vec![vec![100.0, 100.0]],
        }
    }

    #[test]
    fn test_material_ranges() {
        let instance = tiny();
        assert_eq!(instance.secondary_materials(), 0..1);
        assert_eq!(instance.fixed_materials(), 1..2);
        assert_eq!(instance.capacity(1, 1), 100.0);
    }

    #[test]
    fn test_nested_field_name_in_error() {
        let mut instance = tiny();
        instance.demand[0][1] = -1.0;
        let err = instance.validate().unwrap_err();
        assert_eq!(
            err,
            InstanceError::InvalidValue {
                field: "demand[0][1]".to_string(),
                value: -1.0
            }
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(tiny().fingerprint(), tiny().fingerprint());
        let mut other = tiny();
        other.price[0] = 11.0;
        assert_ne!(tiny().fingerprint(), other.fingerprint());
    }
}
