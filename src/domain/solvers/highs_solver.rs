use std::time::Duration;

use log::debug;

use crate::domain::solver::{IlpProblem, IlpSolution, IlpStatus, MipBackend, RowSense};
use crate::error::Result;

use ::highs::{ColProblem, HighsModelStatus, Sense};

/// HiGHS solver implementation
pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        HighsSolver
    }

    /// Convert HiGHS status to our solver status
    fn convert_status(model_status: HighsModelStatus) -> IlpStatus {
        match model_status {
            HighsModelStatus::Optimal => IlpStatus::Optimal,
            HighsModelStatus::Infeasible => IlpStatus::Infeasible,
            HighsModelStatus::ReachedTimeLimit => IlpStatus::TimeLimit,
            HighsModelStatus::UnboundedOrInfeasible | HighsModelStatus::Unbounded => {
                IlpStatus::Unbounded
            }
            other => IlpStatus::Undecided(format!("{:?}", other)),
        }
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MipBackend for HighsSolver {
    fn solve(&self, problem: &IlpProblem, time_limit: Duration) -> Result<IlpSolution> {
        if problem.num_vars() == 0 {
            return Ok(IlpSolution {
                status: IlpStatus::Optimal,
                values: Vec::new(),
                objective: 0,
            });
        }

        let mut highs_problem = ColProblem::new();

        // First, add all constraint rows
        let mut rows = Vec::with_capacity(problem.rows.len());
        for row in &problem.rows {
            let rhs = row.rhs as f64;
            let highs_row = match row.sense {
                RowSense::Le => highs_problem.add_row(..=rhs),
                RowSense::Ge => highs_problem.add_row(rhs..),
                RowSense::Eq => highs_problem.add_row(rhs..=rhs),
            };
            rows.push(highs_row);
        }

        // For each column, collect its row entries
        let mut col_data: Vec<Vec<(usize, f64)>> = vec![Vec::new(); problem.num_vars()];
        for (row_idx, row) in problem.rows.iter().enumerate() {
            for &(col, coeff) in &row.coeffs {
                col_data[col].push((row_idx, coeff as f64));
            }
        }

        for (var, entries) in problem.variables.iter().zip(&col_data) {
            let row_factors: Vec<_> = entries
                .iter()
                .map(|(row_idx, val)| (rows[*row_idx], *val))
                .collect();
            highs_problem.add_integer_column(
                var.cost as f64,
                var.lower as f64..=var.upper as f64,
                &row_factors,
            );
        }

        let mut model = highs_problem.optimise(Sense::Minimise);
        model.set_option("output_flag", false);
        model.set_option("mip_rel_gap", 0.0);
        model.set_option("time_limit", time_limit.as_secs_f64());
        let solved = model.solve();

        let status = Self::convert_status(solved.status());
        debug!("HiGHS finished with {:?}", status);
        if status != IlpStatus::Optimal {
            return Ok(IlpSolution::without_values(status));
        }

        let solution_values = solved.get_solution();
        let values: Vec<i64> = (0..problem.num_vars())
            .map(|col| {
                solution_values
                    .columns()
                    .get(col)
                    .copied()
                    .unwrap_or(0.0)
                    .round() as i64
            })
            .collect();

        // Recompute from the rounded values rather than trusting the float objective
        let objective = problem.objective_value(&values);

        Ok(IlpSolution {
            status,
            values,
            objective,
        })
    }

    fn name(&self) -> &str {
        "HiGHS"
    }
}
