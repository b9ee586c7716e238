use std::collections::HashMap;

use crate::lp_solver::output_suppression::GagHandle;
use crate::lp_solver::*;
use ::coin_cbc::{Model, Sense};

/// Round a floating-point number to a specified number of significant digits
/// This masks floating point noise in CBC's column values.
fn round_to_sig_digits(value: f64, digits: u32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }

    let magnitude = value.abs().log10().floor() as i32;
    let scale = 10_f64.powi(digits as i32 - magnitude - 1);
    (value * scale).round() / scale
}

/// Sum the coefficients of repeated variables.
///
/// CBC's `set_weight` and `set_obj_coeff` overwrite, so an expression such as
/// `production_co2 + transport_co2` mentioning the same flow twice must be merged first.
fn merge_terms<Brand>(expression: &LinearExpression<Brand>) -> Vec<(VariableId<Brand>, f64)> {
    let mut order = Vec::new();
    let mut coefficients: HashMap<VariableId<Brand>, f64> = HashMap::new();
    for term in &expression.terms {
        coefficients
            .entry(term.variable)
            .and_modify(|c| *c += term.coefficient)
            .or_insert_with(|| {
                order.push(term.variable);
                term.coefficient
            });
    }
    order
        .into_iter()
        .map(|var_id| (var_id, coefficients[&var_id]))
        .collect()
}

/// Solve a model using COIN-OR CBC
pub fn solve_coin_cbc<Brand>(builder: &LPModelBuilder<Brand>) -> Result<LPSolution<Brand>> {
    // CBC prints its branch-and-bound log to stdout
    let _gag_handle = GagHandle::stdout()?;
    let mut model = Model::default();
    let mut var_map = HashMap::new();

    for (idx, var_info) in builder.variables.iter().enumerate() {
        let col = match var_info.var_type {
            VariableType::Continuous => {
                let col = model.add_col();
                model.set_col_lower(col, var_info.lower_bound);
                model.set_col_upper(col, var_info.upper_bound);
                col
            }
            VariableType::Binary => model.add_binary(),
        };
        let var_id = VariableId {
            id: idx,
            _brand: std::marker::PhantomData,
        };
        var_map.insert(var_id, col);
    }

    for constraint in &builder.constraints {
        let row = model.add_row();

        for (var_id, coefficient) in merge_terms(&constraint.expression) {
            if let Some(&col) = var_map.get(&var_id) {
                model.set_weight(row, col, coefficient);
            } else {
                return Err(anyhow::anyhow!(
                    "Variable {:?} not found in model (constraint '{}')",
                    var_id,
                    constraint.name
                ));
            }
        }

        let rhs_adjusted = constraint.rhs - constraint.expression.constant;

        match constraint.sense {
            ConstraintSense::LessEqual => {
                model.set_row_upper(row, rhs_adjusted);
            }
            ConstraintSense::Equal => {
                model.set_row_equal(row, rhs_adjusted);
            }
            ConstraintSense::GreaterEqual => {
                model.set_row_lower(row, rhs_adjusted);
            }
        }
    }

    if let Some(obj_info) = &builder.objective {
        for (var_id, coefficient) in merge_terms(&obj_info.expression) {
            if let Some(&col) = var_map.get(&var_id) {
                model.set_obj_coeff(col, coefficient);
            } else {
                return Err(anyhow::anyhow!("Variable {:?} not found in model", var_id));
            }
        }

        let sense = match obj_info.sense {
            OptimizationSense::Minimize => Sense::Minimize,
            OptimizationSense::Maximize => Sense::Maximize,
        };

        model.set_obj_sense(sense);
    }

    let solution = model.solve();

    let status = if solution.raw().is_proven_optimal() {
        OptimizationStatus::Optimal
    } else if solution.raw().is_proven_infeasible() {
        OptimizationStatus::Infeasible
    } else if solution.raw().is_continuous_unbounded() {
        OptimizationStatus::Unbounded
    } else {
        OptimizationStatus::Other("stopped without proven optimum")
    };

    let num_vars = builder.variables.len();
    let mut variable_values = vec![0.0; num_vars];
    if status == OptimizationStatus::Optimal {
        for (var_id, col) in var_map.iter() {
            variable_values[var_id.id] = round_to_sig_digits(solution.col(*col), 10);
        }
    }

    let objective_value = match (&builder.objective, status) {
        (Some(obj_info), OptimizationStatus::Optimal) => {
            let mut obj_val = obj_info.expression.constant;
            for term in &obj_info.expression.terms {
                obj_val += term.coefficient * variable_values[term.variable.id];
            }
            obj_val
        }
        _ => 0.0,
    };

    Ok(LPSolution {
        status,
        objective_value,
        variable_values,
        _brand: std::marker::PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::{merge_terms, round_to_sig_digits};
    use crate::lp_model_builder;
    use crate::lp_solver::VariableType;

    #[test]
    fn test_merge_terms_accumulates_repeated_variables() {
        let mut builder = lp_model_builder!();
        let x = builder.add_variable("x", VariableType::Continuous, 0.0, 1.0);
        let y = builder.add_variable("y", VariableType::Continuous, 0.0, 1.0);

        let merged = merge_terms(&(2.0 * x + y + 0.5 * x - y));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], (x, 2.5));
        assert_eq!(merged[1], (y, 0.0));
    }

    #[test]
    fn test_round_to_sig_digits() {
        assert_eq!(round_to_sig_digits(0.0, 8), 0.0);
        assert_eq!(round_to_sig_digits(16999.999999999996, 8), 17000.0);
        assert!((round_to_sig_digits(1.23456789e-3, 4) - 1.235e-3).abs() < 1e-15);
    }
}
