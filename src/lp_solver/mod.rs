//! Mixed-integer linear programming solver abstraction layer
//!
//! This module provides a trait-free, backend-agnostic model builder so the network
//! design code never talks to a concrete solver. A model is assembled in memory with
//! [`LPModelBuilder`] and handed to COIN-OR CBC or Gurobi only when [`LPModelBuilder::solve`]
//! is called.
//!
//! # Type Safety with Branded Types
//!
//! `VariableId`, `LinearExpression`, `Constraint` and `LPModelBuilder` carry a
//! phantom `Brand` type parameter:
//!
//! - Variables from one builder cannot be used with another builder
//! - Constraints only accept variables from the builder that will consume them
//! - The brand is a zero-sized phantom type, so there is no runtime cost
//!
//! ```rust
//! use supplynet::lp_model_builder;
//! use supplynet::lp_solver::VariableType;
//!
//! let mut flows = lp_model_builder!(Flows);
//! let mut other = lp_model_builder!();
//!
//! let x = flows.add_variable("x", VariableType::Continuous, 0.0, f64::INFINITY);
//! let y = other.add_variable("y", VariableType::Continuous, 0.0, f64::INFINITY);
//!
//! let _ok = x + 2.0;
//! // let _mixed = x + y; // ERROR: different brands
//! ```
//!
//! # Building Models
//!
//! ```rust,no_run
//! use supplynet::{constraint, lp_model_builder};
//! use supplynet::lp_solver::{OptimizationSense, VariableType};
//!
//! let mut builder = lp_model_builder!();
//! let road = builder.add_variable("road", VariableType::Continuous, 0.0, f64::INFINITY);
//! let sea = builder.add_variable("sea", VariableType::Continuous, 0.0, f64::INFINITY);
//! let open = builder.add_variable("open", VariableType::Binary, 0.0, 1.0);
//!
//! builder.add_constraint(constraint!("demand", (road + sea) == 100.0));
//! builder.add_constraint(constraint!("capacity", (sea - 80.0 * open) <= 0.0));
//!
//! builder.set_objective(5.4 * road + 1.3 * sea + 50.0 * open, OptimizationSense::Minimize);
//! let _solution = builder.solve();
//! ```
//!
//! # Solver Selection
//!
//! The backend is selected with the `SUPPLYNET_LP_SOLVER` environment variable:
//! - `"gurobi"` - Gurobi (requires the `gurobi` feature)
//! - `"coin_cbc"` or `"cbc"` - COIN-OR CBC (requires the `coin_cbc` feature)
//!
//! If not set, Gurobi is preferred when compiled in, otherwise CBC.

use anyhow::Result;
use log::debug;
use std::env;
use std::marker::PhantomData;
use std::sync::Arc;

/// Variable types supported by the solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Continuous variable (can take any real value within its bounds)
    Continuous,
    /// Binary variable (can only take values 0 or 1)
    Binary,
}

/// Constraint sense for linear constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    /// Less than or equal to (≤)
    LessEqual,
    /// Equal to (=)
    Equal,
    /// Greater than or equal to (≥)
    GreaterEqual,
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationSense {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

/// Status of the optimization process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Optimal solution found
    Optimal,
    /// Feasible solution found, but not proven optimal
    Feasible,
    /// Problem is infeasible (no solution exists)
    Infeasible,
    /// Problem is unbounded
    Unbounded,
    /// Problem is infeasible or unbounded
    InfeasibleOrUnbounded,
    /// Other status (solver-specific)
    Other(&'static str),
}

impl OptimizationStatus {
    pub fn is_optimal(self) -> bool {
        self == OptimizationStatus::Optimal
    }
}

impl std::fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationStatus::Optimal => write!(f, "optimal"),
            OptimizationStatus::Feasible => write!(f, "feasible (not proven optimal)"),
            OptimizationStatus::Infeasible => write!(f, "infeasible"),
            OptimizationStatus::Unbounded => write!(f, "unbounded"),
            OptimizationStatus::InfeasibleOrUnbounded => write!(f, "infeasible or unbounded"),
            OptimizationStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Available solver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
enum SolverBackend {
    #[cfg(feature = "gurobi")]
    /// Gurobi commercial solver
    Gurobi,
    #[cfg(feature = "coin_cbc")]
    /// COIN-OR CBC open-source solver
    CoinCbc,
}

impl SolverBackend {
    /// Get the solver backend from environment variable or use fallback logic
    fn from_env_or_default() -> Result<Self> {
        if let Ok(solver_name) = env::var("SUPPLYNET_LP_SOLVER") {
            match solver_name.to_lowercase().as_str() {
                "gurobi" => {
                    #[cfg(feature = "gurobi")]
                    return Ok(SolverBackend::Gurobi);
                    #[cfg(not(feature = "gurobi"))]
                    return Err(anyhow::anyhow!(
                        "Gurobi solver requested via SUPPLYNET_LP_SOLVER but gurobi feature not enabled"
                    ));
                }
                "coin_cbc" | "coin-cbc" | "cbc" => {
                    #[cfg(feature = "coin_cbc")]
                    return Ok(SolverBackend::CoinCbc);
                    #[cfg(not(feature = "coin_cbc"))]
                    return Err(anyhow::anyhow!(
                        "Coin CBC solver requested via SUPPLYNET_LP_SOLVER but coin_cbc feature not enabled"
                    ));
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid solver '{}' in SUPPLYNET_LP_SOLVER. Valid options: gurobi, coin_cbc",
                        solver_name
                    ));
                }
            }
        }

        #[cfg(feature = "gurobi")]
        return Ok(SolverBackend::Gurobi);

        #[allow(unreachable_code)]
        #[cfg(feature = "coin_cbc")]
        return Ok(SolverBackend::CoinCbc);

        #[cfg(not(any(feature = "gurobi", feature = "coin_cbc")))]
        Err(anyhow::anyhow!(
            "No solver backend available. Please enable a solver feature (e.g., 'gurobi' or 'coin_cbc')"
        ))
    }
}

/// A linear expression term: coefficient * variable
pub struct LinearTerm<Brand> {
    pub coefficient: f64,
    pub variable: VariableId<Brand>,
}

/// A linear expression: sum of terms plus constant
pub struct LinearExpression<Brand> {
    pub terms: Vec<LinearTerm<Brand>>,
    pub constant: f64,
}

impl<Brand> LinearExpression<Brand> {
    /// Create a new linear expression with a constant term
    pub fn new(constant: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant,
        }
    }

    /// The empty expression, `0`
    pub fn zero() -> Self {
        Self::new(0.0)
    }

    /// Add a term to the expression
    pub fn add_term(&mut self, coefficient: f64, variable: VariableId<Brand>) {
        self.terms.push(LinearTerm {
            coefficient,
            variable,
        });
    }

    /// Create a linear expression from a single variable
    pub fn from_variable(variable: VariableId<Brand>) -> Self {
        Self {
            terms: vec![LinearTerm {
                coefficient: 1.0,
                variable,
            }],
            constant: 0.0,
        }
    }

    /// Sum of variables, each with coefficient 1
    pub fn sum_of(variables: impl IntoIterator<Item = VariableId<Brand>>) -> Self {
        Self {
            terms: variables
                .into_iter()
                .map(|variable| LinearTerm {
                    coefficient: 1.0,
                    variable,
                })
                .collect(),
            constant: 0.0,
        }
    }

    /// True when the expression references no variable
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty()
    }
}

impl<Brand> Default for LinearExpression<Brand> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<Brand> From<VariableId<Brand>> for LinearExpression<Brand> {
    fn from(variable: VariableId<Brand>) -> Self {
        Self::from_variable(variable)
    }
}

/// Unique identifier for a variable in the model
///
/// The `Brand` type parameter ensures that variables can only be used with the
/// builder that created them. This is enforced at compile time.
pub struct VariableId<Brand> {
    id: usize,
    _brand: PhantomData<fn() -> Brand>,
}

// Manual trait implementations that don't require Brand to implement anything
impl<Brand> std::fmt::Debug for VariableId<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableId").field("id", &self.id).finish()
    }
}

impl<Brand> Clone for VariableId<Brand> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Brand> Copy for VariableId<Brand> {}

impl<Brand> PartialEq for VariableId<Brand> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<Brand> Eq for VariableId<Brand> {}

impl<Brand> std::hash::Hash for VariableId<Brand> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// Brands are bare marker structs, so these impls must not require anything of `Brand`
impl<Brand> Clone for LinearTerm<Brand> {
    fn clone(&self) -> Self {
        LinearTerm {
            coefficient: self.coefficient,
            variable: self.variable,
        }
    }
}

impl<Brand> std::fmt::Debug for LinearTerm<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} * {:?}", self.coefficient, self.variable)
    }
}

impl<Brand> Clone for LinearExpression<Brand> {
    fn clone(&self) -> Self {
        LinearExpression {
            terms: self.terms.clone(),
            constant: self.constant,
        }
    }
}

impl<Brand> std::fmt::Debug for LinearExpression<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearExpression")
            .field("terms", &self.terms)
            .field("constant", &self.constant)
            .finish()
    }
}

/// Unique identifier for a constraint in the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

/// A named linear constraint
///
/// Constraints are usually built with the [`constraint!`](crate::constraint) macro:
///
/// ```rust
/// use supplynet::constraint;
/// use supplynet::lp_model_builder;
/// use supplynet::lp_solver::{Constraint, VariableType};
///
/// let mut builder = lp_model_builder!();
/// let x = builder.add_variable("x", VariableType::Continuous, 0.0, 10.0);
/// let y = builder.add_variable("y", VariableType::Continuous, 0.0, 10.0);
///
/// let _c = constraint!((x + y) == 10.0);
/// let _c = constraint!("balance", (x - y) == 0.0);
/// let _c = Constraint::le(x + y, 10.0);
/// ```
pub struct Constraint<Brand> {
    name: Arc<str>,
    expression: LinearExpression<Brand>,
    sense: ConstraintSense,
    rhs: f64,
}

impl<Brand> Clone for Constraint<Brand> {
    fn clone(&self) -> Self {
        Constraint {
            name: self.name.clone(),
            expression: self.expression.clone(),
            sense: self.sense,
            rhs: self.rhs,
        }
    }
}

impl<Brand> std::fmt::Debug for Constraint<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("expression", &self.expression)
            .field("sense", &self.sense)
            .field("rhs", &self.rhs)
            .finish()
    }
}

impl<Brand> Constraint<Brand> {
    /// Create a new constraint
    pub fn new(
        name: Arc<str>,
        expression: impl Into<LinearExpression<Brand>>,
        sense: ConstraintSense,
        rhs: f64,
    ) -> Self {
        Self {
            name,
            expression: expression.into(),
            sense,
            rhs,
        }
    }

    /// Create an unnamed equality constraint: expression == rhs
    pub fn eq(expression: impl Into<LinearExpression<Brand>>, rhs: f64) -> Self {
        Self::new(Arc::from(""), expression, ConstraintSense::Equal, rhs)
    }

    /// Create an unnamed less-than-or-equal constraint: expression <= rhs
    pub fn le(expression: impl Into<LinearExpression<Brand>>, rhs: f64) -> Self {
        Self::new(Arc::from(""), expression, ConstraintSense::LessEqual, rhs)
    }

    /// Create an unnamed greater-than-or-equal constraint: expression >= rhs
    pub fn ge(expression: impl Into<LinearExpression<Brand>>, rhs: f64) -> Self {
        Self::new(Arc::from(""), expression, ConstraintSense::GreaterEqual, rhs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sense(&self) -> ConstraintSense {
        self.sense
    }

    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn expression(&self) -> &LinearExpression<Brand> {
        &self.expression
    }
}

/// Variable information stored in the model
#[derive(Debug, Clone)]
struct VariableInfo {
    name: Arc<str>,
    var_type: VariableType,
    lower_bound: f64,
    upper_bound: f64,
}

/// Objective function information
struct ObjectiveInfo<Brand> {
    expression: LinearExpression<Brand>,
    sense: OptimizationSense,
}

/// Result of solving a model
pub struct LPSolution<Brand> {
    pub status: OptimizationStatus,
    pub objective_value: f64,
    variable_values: Vec<f64>,
    _brand: PhantomData<fn() -> Brand>,
}

impl<Brand> Clone for LPSolution<Brand> {
    fn clone(&self) -> Self {
        LPSolution {
            status: self.status,
            objective_value: self.objective_value,
            variable_values: self.variable_values.clone(),
            _brand: PhantomData,
        }
    }
}

impl<Brand> std::fmt::Debug for LPSolution<Brand> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LPSolution")
            .field("status", &self.status)
            .field("objective_value", &self.objective_value)
            .field("variable_values", &self.variable_values)
            .finish()
    }
}

impl<Brand> LPSolution<Brand> {
    #[cfg(test)]
    pub(crate) fn from_values(
        status: OptimizationStatus,
        objective_value: f64,
        variable_values: Vec<f64>,
    ) -> Self {
        LPSolution {
            status,
            objective_value,
            variable_values,
            _brand: PhantomData,
        }
    }

    /// Get the value of a variable from the solution
    pub fn get_value(&self, var_id: VariableId<Brand>) -> Option<f64> {
        self.variable_values.get(var_id.id).copied()
    }

    /// Evaluate a linear expression at the solution point
    ///
    /// Variables without a value (which cannot happen for variables of the solved
    /// builder) contribute nothing.
    pub fn evaluate(&self, expression: &LinearExpression<Brand>) -> f64 {
        expression.constant
            + expression
                .terms
                .iter()
                .map(|term| term.coefficient * self.get_value(term.variable).unwrap_or(0.0))
                .sum::<f64>()
    }
}

/// Builder for MILP models that can work with different backends
///
/// The `Brand` type parameter ensures type safety - variables from one builder
/// cannot be accidentally used with another builder.
pub struct LPModelBuilder<Brand> {
    variables: Vec<VariableInfo>,
    constraints: Vec<Constraint<Brand>>,
    objective: Option<ObjectiveInfo<Brand>>,
    _brand: PhantomData<fn() -> Brand>,
}

impl<Brand> LPModelBuilder<Brand> {
    /// Create a new model builder
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
            _brand: PhantomData,
        }
    }

    /// Add a variable to the model
    pub fn add_variable(
        &mut self,
        name: impl Into<Arc<str>>,
        var_type: VariableType,
        lower_bound: f64,
        upper_bound: f64,
    ) -> VariableId<Brand> {
        let var_id = VariableId {
            id: self.variables.len(),
            _brand: PhantomData,
        };
        self.variables.push(VariableInfo {
            name: name.into(),
            var_type,
            lower_bound,
            upper_bound,
        });
        var_id
    }

    /// Add a constraint to the model
    pub fn add_constraint(&mut self, constraint: Constraint<Brand>) -> ConstraintId {
        let constr_id = ConstraintId(self.constraints.len());
        self.constraints.push(constraint);
        constr_id
    }

    /// Set the objective function
    pub fn set_objective(&mut self, expression: LinearExpression<Brand>, sense: OptimizationSense) {
        self.objective = Some(ObjectiveInfo { expression, sense });
    }

    /// Name given to a variable when it was created
    pub fn variable_name(&self, var_id: VariableId<Brand>) -> Option<&str> {
        self.variables.get(var_id.id).map(|info| info.name.as_ref())
    }

    /// Type of a variable
    pub fn variable_type(&self, var_id: VariableId<Brand>) -> Option<VariableType> {
        self.variables.get(var_id.id).map(|info| info.var_type)
    }

    /// Every variable with its name, in creation order
    pub fn variables(&self) -> impl Iterator<Item = (VariableId<Brand>, &str)> + '_ {
        self.variables.iter().enumerate().map(|(id, info)| {
            (
                VariableId {
                    id,
                    _brand: PhantomData,
                },
                info.name.as_ref(),
            )
        })
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint<Brand>] {
        &self.constraints
    }

    /// Look up a constraint by its name
    pub fn constraint_named(&self, name: &str) -> Option<&Constraint<Brand>> {
        self.constraints.iter().find(|c| c.name() == name)
    }

    /// Solve the model using the configured backend
    pub fn solve(&self) -> Result<LPSolution<Brand>> {
        let solver = SolverBackend::from_env_or_default()?;
        debug!(
            "solving model with {} variables and {} constraints using {:?}",
            self.variables.len(),
            self.constraints.len(),
            solver
        );

        match solver {
            #[cfg(feature = "gurobi")]
            SolverBackend::Gurobi => crate::lp_solver::gurobi::solve_gurobi(self),

            #[cfg(feature = "coin_cbc")]
            SolverBackend::CoinCbc => crate::lp_solver::coin_cbc::solve_coin_cbc(self),
        }
    }
}

impl<Brand> Default for LPModelBuilder<Brand> {
    fn default() -> Self {
        Self::new()
    }
}

// Macros for convenient syntax
pub mod macros;

// Operator overloading for linear expressions
pub mod ops;

pub mod output_suppression;

#[cfg(feature = "gurobi")]
pub mod gurobi;

#[cfg(feature = "coin_cbc")]
pub mod coin_cbc;
