use std::collections::HashMap;

use ::gurobi::{ConstrSense, Env, LinExpr, Model, ModelSense, Status, VarType, attr};

use crate::lp_solver::output_suppression::suppress_output;
use crate::lp_solver::*;

fn to_lin_expr<Brand>(
    expression: &LinearExpression<Brand>,
    var_map: &HashMap<VariableId<Brand>, ::gurobi::Var>,
) -> Result<LinExpr> {
    let mut gurobi_expr = LinExpr::new();
    for term in &expression.terms {
        let var = var_map
            .get(&term.variable)
            .ok_or_else(|| anyhow::anyhow!("Variable {:?} not found in model", term.variable))?;
        gurobi_expr = gurobi_expr.add_term(term.coefficient, var.clone());
    }
    Ok(gurobi_expr.add_constant(expression.constant))
}

/// Solve a model using Gurobi
pub fn solve_gurobi<Brand>(builder: &LPModelBuilder<Brand>) -> Result<LPSolution<Brand>> {
    // Gurobi writes its banner to stdout and licence notices to stderr
    let _gag_handles = suppress_output()?;
    let env = Env::new("")?;
    let mut model = Model::new("supply_network", &env)?;

    let mut var_map = HashMap::new();
    for (idx, var_info) in builder.variables.iter().enumerate() {
        let vtype = match var_info.var_type {
            VariableType::Continuous => VarType::Continuous,
            VariableType::Binary => VarType::Binary,
        };

        let var = model.add_var(
            &var_info.name,
            vtype,
            0.0,
            var_info.lower_bound,
            var_info.upper_bound,
            &[],
            &[],
        )?;

        let var_id = VariableId {
            id: idx,
            _brand: std::marker::PhantomData,
        };
        var_map.insert(var_id, var);
    }

    for constraint in &builder.constraints {
        let gurobi_expr = to_lin_expr(&constraint.expression, &var_map)?;
        let sense = match constraint.sense {
            ConstraintSense::LessEqual => ConstrSense::Less,
            ConstraintSense::Equal => ConstrSense::Equal,
            ConstraintSense::GreaterEqual => ConstrSense::Greater,
        };
        model.add_constr(&constraint.name, gurobi_expr, sense, constraint.rhs)?;
    }

    model.update()?;

    if let Some(obj_info) = &builder.objective {
        let gurobi_expr = to_lin_expr(&obj_info.expression, &var_map)?;
        let sense = match obj_info.sense {
            OptimizationSense::Minimize => ModelSense::Minimize,
            OptimizationSense::Maximize => ModelSense::Maximize,
        };
        model.set_objective(gurobi_expr, sense)?;
    }

    model.optimize()?;

    let status = match model.status()? {
        Status::Optimal => OptimizationStatus::Optimal,
        Status::SubOptimal => OptimizationStatus::Feasible,
        Status::Infeasible => OptimizationStatus::Infeasible,
        Status::Unbounded => OptimizationStatus::Unbounded,
        Status::InfOrUnbd => OptimizationStatus::InfeasibleOrUnbounded,
        Status::TimeLimit => OptimizationStatus::Other("time limit reached"),
        _ => OptimizationStatus::Other("stopped without proven optimum"),
    };

    let mut variable_values = vec![0.0; builder.variables.len()];
    let objective_value = if status == OptimizationStatus::Optimal {
        for (var_id, var) in &var_map {
            variable_values[var_id.id] = var.get(&model, attr::X)?;
        }
        model.get(attr::ObjVal)?
    } else {
        0.0
    };

    Ok(LPSolution {
        status,
        objective_value,
        variable_values,
        _brand: std::marker::PhantomData,
    })
}
