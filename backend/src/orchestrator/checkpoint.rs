//! Checkpoint - Model Snapshots
//!
//! Captures the mutable part of a planning model (variable bounds and the
//! set of constraint names) so a restore can be checked against the state
//! before the replicate ran.
//!
//! # Critical Invariants
//!
//! - **Bounds**: Every variable returns to the exact bit pattern it had
//! - **Constraints**: The named-constraint set is identical
//! - **Fingerprint**: Equal snapshots hash equal, so a single string
//!   comparison confirms a clean restore

use crate::lp::{LinearProgram, LpError, VarRef};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Bounds of one variable
///
/// An unbounded side is stored as `None` so snapshots survive JSON, which
/// has no infinities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableBounds {
    pub name: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl VariableBounds {
    fn new(name: &str, lower: f64, upper: f64) -> Self {
        Self {
            name: name.to_string(),
            lower: lower.is_finite().then_some(lower),
            upper: upper.is_finite().then_some(upper),
        }
    }

    fn same_bits(&self, other: &Self) -> bool {
        let bits = |value: Option<f64>| value.map(f64::to_bits);
        self.name == other.name
            && bits(self.lower) == bits(other.lower)
            && bits(self.upper) == bits(other.upper)
    }
}

/// Bounds and constraint names of a model at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Bounds in variable creation order
    pub bounds: Vec<VariableBounds>,

    /// Constraint names, sorted
    pub constraints: Vec<String>,
}

impl ModelSnapshot {
    /// Capture the current state of `lp`
    pub fn capture<L: LinearProgram>(lp: &L) -> Result<Self, LpError> {
        let bounds = (0..lp.num_variables())
            .map(|index| {
                let var = VarRef(index);
                let (lower, upper) = lp.bounds(var)?;
                Ok(VariableBounds::new(lp.variable_name(var)?, lower, upper))
            })
            .collect::<Result<Vec<_>, LpError>>()?;

        Ok(Self {
            bounds,
            constraints: lp.constraint_names(),
        })
    }

    /// Hex SHA-256 over names and bound bit patterns
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for var in &self.bounds {
            hasher.update(var.name.as_bytes());
            for side in [var.lower, var.upper] {
                match side {
                    Some(value) => {
                        hasher.update([1u8]);
                        hasher.update(value.to_bits().to_le_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
        }
        for name in &self.constraints {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Human-readable list of everything that differs from `other`
    ///
    /// Empty when the two snapshots are bit-identical.
    pub fn differences(&self, other: &ModelSnapshot) -> Vec<String> {
        let mut diffs = Vec::new();

        if self.bounds.len() != other.bounds.len() {
            diffs.push(format!(
                "variable count changed: {} -> {}",
                self.bounds.len(),
                other.bounds.len()
            ));
        }
        for (before, after) in self.bounds.iter().zip(&other.bounds) {
            if !before.same_bits(after) {
                diffs.push(format!(
                    "bounds of {} changed: [{}, {}] -> [{}, {}]",
                    before.name,
                    display_bound(before.lower, "-inf"),
                    display_bound(before.upper, "inf"),
                    display_bound(after.lower, "-inf"),
                    display_bound(after.upper, "inf"),
                ));
            }
        }

        for name in &self.constraints {
            if other.constraints.binary_search(name).is_err() {
                diffs.push(format!("constraint {} missing", name));
            }
        }
        for name in &other.constraints {
            if self.constraints.binary_search(name).is_err() {
                diffs.push(format!("constraint {} added", name));
            }
        }

        diffs
    }
}

fn display_bound(value: Option<f64>, unbounded: &str) -> String {
    value.map_or_else(|| unbounded.to_string(), |v| v.to_string())
}
