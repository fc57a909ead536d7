//! Linear program interface
//!
//! The simulation engine talks to the solver only through the
//! [`LinearProgram`] trait: create continuous variables, add and remove
//! named constraints, set bounds and the objective, optimize, and read
//! solution values. Any solver implementing the trait is interchangeable.
//!
//! # Naming contract
//!
//! Variable and constraint names are unique within a model. Constraint
//! names are the only removal key; a duplicate name or removing a name that
//! is absent is a programming fault reported as an [`LpError`], never
//! silently ignored.
//!
//! # Solution lifetime
//!
//! Values from the most recent `Optimal` solve stay readable until the next
//! call to [`LinearProgram::optimize`], even if bounds or constraints are
//! modified in between. After a non-optimal solve no values are available.

mod expr;
mod microlp_backend;

pub use expr::LinearExpr;
pub use microlp_backend::MicroLpModel;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle to a model variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarRef(pub(crate) usize);

impl VarRef {
    /// Position of the variable in creation order
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a constraint, valid until the constraint is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintRef(pub(crate) u64);

/// Constraint sense: `expr <sense> rhs`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// Objective direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Maximize,
    Minimize,
}

/// Terminal status of an optimize pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// Any other solver outcome, with the solver's message
    Other(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Other(msg) => write!(f, "other ({})", msg),
        }
    }
}

/// Solver interface errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LpError {
    #[error("Duplicate variable name: {0}")]
    DuplicateVariable(String),

    #[error("Duplicate constraint name: {0}")]
    DuplicateConstraint(String),

    #[error("Constraint not found: {0}")]
    ConstraintNotFound(String),

    #[error("Unknown variable index {0}")]
    UnknownVariable(usize),

    #[error("Invalid bounds [{lower}, {upper}] for variable {name}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("No optimal solution available")]
    NoSolution,
}

/// Operations the simulation engine needs from an LP solver
pub trait LinearProgram {
    /// Create a continuous variable with bounds `[lower, upper]`
    fn add_variable(&mut self, name: &str, lower: f64, upper: f64) -> Result<VarRef, LpError>;

    /// Add the named constraint `expr <sense> rhs`
    fn add_constraint(
        &mut self,
        name: &str,
        expr: LinearExpr,
        sense: Sense,
        rhs: f64,
    ) -> Result<ConstraintRef, LpError>;

    /// Remove a constraint by name
    ///
    /// # Errors
    /// [`LpError::ConstraintNotFound`] if no constraint has this name.
    fn remove_constraint(&mut self, name: &str) -> Result<(), LpError>;

    fn has_constraint(&self, name: &str) -> bool;

    /// Names of all constraints currently in the model, sorted
    fn constraint_names(&self) -> Vec<String>;

    fn set_bounds(&mut self, var: VarRef, lower: f64, upper: f64) -> Result<(), LpError>;

    fn bounds(&self, var: VarRef) -> Result<(f64, f64), LpError>;

    fn variable_name(&self, var: VarRef) -> Result<&str, LpError>;

    fn num_variables(&self) -> usize;

    /// Replace the objective
    fn set_objective(&mut self, expr: LinearExpr, direction: Direction);

    /// Run an optimize pass; blocks until the solver reaches a terminal status
    fn optimize(&mut self) -> SolveStatus;

    /// Value of `var` in the last optimal solution
    fn value(&self, var: VarRef) -> Result<f64, LpError>;

    /// Objective value of the last optimal solution
    fn objective_value(&self) -> Result<f64, LpError>;
}
