//! Linear expressions over model variables

use super::VarRef;
use serde::{Deserialize, Serialize};

/// Sparse linear expression `Σ coeff·var + constant`
///
/// Terms are kept in insertion order; repeated variables are allowed and
/// summed by the backend.
///
/// # Example
/// ```
/// use mps_simulator_core::lp::{LinearExpr, LinearProgram, MicroLpModel};
///
/// let mut lp = MicroLpModel::new();
/// let x = lp.add_variable("x", 0.0, f64::INFINITY).unwrap();
/// let expr = LinearExpr::new().with_term(x, 2.0).with_constant(1.0);
/// assert_eq!(expr.terms().len(), 1);
/// assert_eq!(expr.constant(), 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<(VarRef, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `coeff·var`; zero coefficients are dropped
    pub fn add_term(&mut self, var: VarRef, coeff: f64) {
        if coeff != 0.0 {
            self.terms.push((var, coeff));
        }
    }

    pub fn with_term(mut self, var: VarRef, coeff: f64) -> Self {
        self.add_term(var, coeff);
        self
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn with_constant(mut self, value: f64) -> Self {
        self.add_constant(value);
        self
    }

    /// Append all terms and the constant of `other`
    pub fn extend(&mut self, other: &LinearExpr) {
        self.terms.extend_from_slice(&other.terms);
        self.constant += other.constant;
    }

    pub fn terms(&self) -> &[(VarRef, f64)] {
        &self.terms
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Evaluate the expression with `value_of` supplying variable values
    pub fn evaluate(&self, mut value_of: impl FnMut(VarRef) -> f64) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coeff)| coeff * value_of(var))
            .sum::<f64>()
            + self.constant
    }
}

impl FromIterator<(VarRef, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarRef, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        for (var, coeff) in iter {
            expr.add_term(var, coeff);
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_coefficients_dropped() {
        let expr: LinearExpr = vec![(VarRef(0), 0.0), (VarRef(1), 3.0)].into_iter().collect();
        assert_eq!(expr.terms(), &[(VarRef(1), 3.0)]);
    }

    #[test]
    fn test_evaluate() {
        let expr = LinearExpr::new()
            .with_term(VarRef(0), 2.0)
            .with_term(VarRef(1), -1.0)
            .with_constant(4.0);
        let values = [3.0, 5.0];
        assert_eq!(expr.evaluate(|v| values[v.index()]), 2.0 * 3.0 - 5.0 + 4.0);
    }
}
