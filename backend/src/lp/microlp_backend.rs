//! Pure-Rust LP backend built on the `microlp` simplex solver
//!
//! `microlp` problems are append-only, so this backend keeps the model as
//! plain data (variables, named constraints, objective) and builds a fresh
//! `microlp::Problem` on every optimize pass.
//!
//! Constraints are stored by name in a `BTreeMap`. The problem handed to the
//! solver therefore depends only on the current constraint set, not on the
//! order constraints were removed and re-added in, which keeps replicates
//! reproducible after a prune/restore cycle.

use super::{ConstraintRef, Direction, LinearExpr, LinearProgram, LpError, Sense, SolveStatus, VarRef};
use microlp::{ComparisonOp, OptimizationDirection, Problem};
use std::collections::{BTreeMap, HashMap};

/// Feasibility slack for constraints whose terms all cancel out
const EMPTY_ROW_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
struct VariableDef {
    name: String,
    lower: f64,
    upper: f64,
}

#[derive(Debug, Clone)]
struct ConstraintDef {
    expr: LinearExpr,
    sense: Sense,
    rhs: f64,
}

#[derive(Debug, Clone)]
struct SolvedValues {
    values: Vec<f64>,
    objective: f64,
}

/// In-memory LP model solved with `microlp`
///
/// # Example
/// ```
/// use mps_simulator_core::lp::{Direction, LinearExpr, LinearProgram, MicroLpModel, Sense, SolveStatus};
///
/// let mut lp = MicroLpModel::new();
/// let x = lp.add_variable("x", 0.0, f64::INFINITY).unwrap();
/// lp.add_constraint("cap", LinearExpr::new().with_term(x, 1.0), Sense::Le, 4.0).unwrap();
/// lp.set_objective(LinearExpr::new().with_term(x, 3.0), Direction::Maximize);
///
/// assert_eq!(lp.optimize(), SolveStatus::Optimal);
/// assert!((lp.value(x).unwrap() - 4.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct MicroLpModel {
    variables: Vec<VariableDef>,
    variable_names: HashMap<String, usize>,
    constraints: BTreeMap<String, ConstraintDef>,
    objective: LinearExpr,
    direction: Direction,
    next_constraint_id: u64,
    solution: Option<SolvedValues>,
}

impl Default for MicroLpModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroLpModel {
    /// Create an empty model with a zero objective to maximize
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            variable_names: HashMap::new(),
            constraints: BTreeMap::new(),
            objective: LinearExpr::new(),
            direction: Direction::Maximize,
            next_constraint_id: 0,
            solution: None,
        }
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    fn variable(&self, var: VarRef) -> Result<&VariableDef, LpError> {
        self.variables
            .get(var.0)
            .ok_or(LpError::UnknownVariable(var.0))
    }

    fn check_terms(&self, expr: &LinearExpr) -> Result<(), LpError> {
        for &(var, _) in expr.terms() {
            self.variable(var)?;
        }
        Ok(())
    }
}

/// Sum repeated variables and drop terms that cancel
fn merged_terms(expr: &LinearExpr) -> BTreeMap<usize, f64> {
    let mut merged = BTreeMap::new();
    for &(var, coeff) in expr.terms() {
        *merged.entry(var.0).or_insert(0.0) += coeff;
    }
    merged.retain(|_, coeff| *coeff != 0.0);
    merged
}

fn row_satisfied(lhs: f64, sense: Sense, rhs: f64) -> bool {
    match sense {
        Sense::Le => lhs <= rhs + EMPTY_ROW_TOLERANCE,
        Sense::Ge => lhs >= rhs - EMPTY_ROW_TOLERANCE,
        Sense::Eq => (lhs - rhs).abs() <= EMPTY_ROW_TOLERANCE,
    }
}

impl LinearProgram for MicroLpModel {
    fn add_variable(&mut self, name: &str, lower: f64, upper: f64) -> Result<VarRef, LpError> {
        if self.variable_names.contains_key(name) {
            return Err(LpError::DuplicateVariable(name.to_string()));
        }
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(LpError::InvalidBounds {
                name: name.to_string(),
                lower,
                upper,
            });
        }
        let index = self.variables.len();
        self.variables.push(VariableDef {
            name: name.to_string(),
            lower,
            upper,
        });
        self.variable_names.insert(name.to_string(), index);
        Ok(VarRef(index))
    }

    fn add_constraint(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: Sense,
        rhs: f64,
    ) -> Result<ConstraintRef, LpError> {
        if self.constraints.contains_key(name) {
            return Err(LpError::DuplicateConstraint(name.to_string()));
        }
        self.check_terms(&expr)?;
        let id = self.next_constraint_id;
        self.next_constraint_id += 1;
        self.constraints.insert(
            name.to_string(),
            ConstraintDef {
                expr,
                sense,
                rhs,
            },
        );
        Ok(ConstraintRef(id))
    }

    fn remove_constraint(&mut self, name: &str) -> Result<(), LpError> {
        self.constraints
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| LpError::ConstraintNotFound(name.to_string()))
    }

    fn has_constraint(&self, name: &str) -> bool {
        self.constraints.contains_key(name)
    }

    fn constraint_names(&self) -> Vec<String> {
        self.constraints.keys().cloned().collect()
    }

    fn set_bounds(&mut self, var: VarRef, lower: f64, upper: f64) -> Result<(), LpError> {
        let def = self
            .variables
            .get_mut(var.0)
            .ok_or(LpError::UnknownVariable(var.0))?;
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(LpError::InvalidBounds {
                name: def.name.clone(),
                lower,
                upper,
            });
        }
        def.lower = lower;
        def.upper = upper;
        Ok(())
    }

    fn bounds(&self, var: VarRef) -> Result<(f64, f64), LpError> {
        let def = self.variable(var)?;
        Ok((def.lower, def.upper))
    }

    fn variable_name(&self, var: VarRef) -> Result<&str, LpError> {
        Ok(self.variable(var)?.name.as_str())
    }

    fn num_variables(&self) -> usize {
        self.variables.len()
    }

    fn set_objective(&mut self, expr: LinearExpr, direction: Direction) {
        self.objective = expr;
        self.direction = direction;
    }

    fn optimize(&mut self) -> SolveStatus {
        self.solution = None;

        let direction = match self.direction {
            Direction::Maximize => OptimizationDirection::Maximize,
            Direction::Minimize => OptimizationDirection::Minimize,
        };
        let mut problem = Problem::new(direction);

        let mut objective = vec![0.0; self.variables.len()];
        for (index, coeff) in merged_terms(&self.objective) {
            objective[index] = coeff;
        }
        let vars: Vec<microlp::Variable> = self
            .variables
            .iter()
            .zip(&objective)
            .map(|(def, &coeff)| problem.add_var(coeff, (def.lower, def.upper)))
            .collect();

        for def in self.constraints.values() {
            let rhs = def.rhs - def.expr.constant();
            let terms = merged_terms(&def.expr);
            if terms.is_empty() {
                if !row_satisfied(0.0, def.sense, rhs) {
                    return SolveStatus::Infeasible;
                }
                continue;
            }
            let mut expr = microlp::LinearExpr::empty();
            for (index, coeff) in terms {
                expr.add(vars[index], coeff);
            }
            let op = match def.sense {
                Sense::Le => ComparisonOp::Le,
                Sense::Ge => ComparisonOp::Ge,
                Sense::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(expr, op, rhs);
        }

        match problem.solve() {
            Ok(solution) => {
                let values = vars.iter().map(|&var| solution[var]).collect();
                self.solution = Some(SolvedValues {
                    values,
                    objective: solution.objective() + self.objective.constant(),
                });
                SolveStatus::Optimal
            }
            Err(microlp::Error::Infeasible) => SolveStatus::Infeasible,
            Err(microlp::Error::Unbounded) => SolveStatus::Unbounded,
            #[allow(unreachable_patterns)]
            Err(other) => SolveStatus::Other(other.to_string()),
        }
    }

    fn value(&self, var: VarRef) -> Result<f64, LpError> {
        self.variable(var)?;
        self.solution
            .as_ref()
            .map(|solved| solved.values[var.0])
            .ok_or(LpError::NoSolution)
    }

    fn objective_value(&self) -> Result<f64, LpError> {
        self.solution
            .as_ref()
            .map(|solved| solved.objective)
            .ok_or(LpError::NoSolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_ids_are_not_reused() {
        let mut lp = MicroLpModel::new();
        let x = lp.add_variable("x", 0.0, 1.0).unwrap();
        let first = lp
            .add_constraint("c", LinearExpr::new().with_term(x, 1.0), Sense::Le, 1.0)
            .unwrap();
        lp.remove_constraint("c").unwrap();
        let second = lp
            .add_constraint("c", LinearExpr::new().with_term(x, 1.0), Sense::Le, 1.0)
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_cancelled_row_checked_without_solver() {
        let mut lp = MicroLpModel::new();
        let x = lp.add_variable("x", 0.0, 1.0).unwrap();
        let expr = LinearExpr::new().with_term(x, 1.0).with_term(x, -1.0);
        lp.add_constraint("empty", expr, Sense::Ge, 1.0).unwrap();
        assert_eq!(lp.optimize(), SolveStatus::Infeasible);
    }

    #[test]
    fn test_objective_constant_included() {
        let mut lp = MicroLpModel::new();
        let x = lp.add_variable("x", 0.0, 2.0).unwrap();
        lp.set_objective(
            LinearExpr::new().with_term(x, 1.0).with_constant(10.0),
            Direction::Maximize,
        );
        assert!(lp.optimize().is_optimal());
        assert!((lp.objective_value().unwrap() - 12.0).abs() < 1e-9);
    }
}
