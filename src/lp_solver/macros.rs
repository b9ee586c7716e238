//! Macros for the solver module
//!
//! Convenient syntax for creating branded model builders and constraints.

/// Create a new model builder with a unique brand
///
/// Each invocation defines a fresh brand type, so variables of one model can never be
/// used in another.
///
/// ```rust
/// use supplynet::lp_model_builder;
/// use supplynet::lp_solver::VariableType;
///
/// // Anonymous brand
/// let mut builder = lp_model_builder!();
/// let x = builder.add_variable("x", VariableType::Continuous, 0.0, 10.0);
///
/// // Named brand (easier to identify in type errors)
/// let mut network = lp_model_builder!(NetworkDesign);
/// let f = network.add_variable("f", VariableType::Continuous, 0.0, f64::INFINITY);
///
/// // network.add_constraint(supplynet::constraint!((x) <= 50.0)); // ERROR: wrong brand
/// ```
#[macro_export]
macro_rules! lp_model_builder {
    // Named brand - user provides the brand name
    ($brand_name:ident) => {{
        struct $brand_name;
        $crate::lp_solver::LPModelBuilder::<$brand_name>::new()
    }};

    // Anonymous brand - each expansion gets its own `UniqueBrand` in a fresh block scope
    () => {{
        struct UniqueBrand;
        $crate::lp_solver::LPModelBuilder::<UniqueBrand>::new()
    }};
}

/// Create constraints using natural comparison syntax
///
/// The left-hand side must be in parentheses. An optional leading name labels the
/// constraint for the solver log and for lookups.
///
/// ```rust
/// use supplynet::constraint;
/// use supplynet::lp_model_builder;
/// use supplynet::lp_solver::VariableType;
///
/// let mut builder = lp_model_builder!();
/// let x = builder.add_variable("x", VariableType::Continuous, 0.0, 10.0);
/// let y = builder.add_variable("y", VariableType::Continuous, 0.0, 10.0);
///
/// let c1 = constraint!((x + y) == 10.0);
/// let c2 = constraint!((2.0 * x) <= 5.0);
/// let c3 = constraint!("balance", (x - y) >= 0.0);
/// builder.add_constraint(constraint!(format!("cap[{}]", "PED"), (x) <= 45000.0));
/// ```
#[macro_export]
macro_rules! constraint {
    // Unnamed constraints
    (($lhs:expr) == $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from(""),
            $lhs,
            $crate::lp_solver::ConstraintSense::Equal,
            $rhs as f64,
        )
    };
    (($lhs:expr) <= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from(""),
            $lhs,
            $crate::lp_solver::ConstraintSense::LessEqual,
            $rhs as f64,
        )
    };
    (($lhs:expr) >= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from(""),
            $lhs,
            $crate::lp_solver::ConstraintSense::GreaterEqual,
            $rhs as f64,
        )
    };

    // Named constraints
    ($name:expr, ($lhs:expr) == $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from($name),
            $lhs,
            $crate::lp_solver::ConstraintSense::Equal,
            $rhs as f64,
        )
    };
    ($name:expr, ($lhs:expr) <= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from($name),
            $lhs,
            $crate::lp_solver::ConstraintSense::LessEqual,
            $rhs as f64,
        )
    };
    ($name:expr, ($lhs:expr) >= $rhs:expr) => {
        $crate::lp_solver::Constraint::new(
            std::sync::Arc::from($name),
            $lhs,
            $crate::lp_solver::ConstraintSense::GreaterEqual,
            $rhs as f64,
        )
    };
}

#[cfg(test)]
mod tests {
    use crate::lp_solver::VariableType;

    #[test]
    fn test_named_brand_lp_model_builder() {
        let mut model1 = lp_model_builder!(TestModel1);
        let mut model2 = lp_model_builder!(TestModel2);

        let x1 = model1.add_variable("x1", VariableType::Continuous, 0.0, 10.0);
        let x2 = model2.add_variable("x2", VariableType::Continuous, 0.0, 10.0);

        let _expr1 = x1 + 5.0;
        let _expr2 = x2 + 5.0;

        // This would NOT compile if uncommented (different brands):
        // let _mixed = x1 + x2;
    }

    #[test]
    fn test_branded_constraints_work() {
        let mut model = lp_model_builder!(ConstraintTestModel);
        let x = model.add_variable("x", VariableType::Continuous, 0.0, 10.0);
        let y = model.add_variable("y", VariableType::Continuous, 0.0, 10.0);

        model.add_constraint(constraint!((x + y) == 10.0));
        model.add_constraint(constraint!(format!("cap[{}]", "x"), (x * 2.0) <= 20.0));

        assert_eq!(model.num_constraints(), 2);
        assert!(model.constraint_named("cap[x]").is_some());
    }
}
