use std::collections::HashMap;

use crate::domain::plan::PurchasePlan;
use crate::domain::solver::{IlpProblem, IlpStatus, RowSense};
use crate::error::{Result, SourcingError};
use crate::models::{PlanDocument, PlanItemDocument, PlanSummary, SellerDocument, SolverDocument};

use glpk_rust::{
    Bound, IntegerSparseMatrix as GlpkMatrix, SparseLEIntegerPolyhedron as GlpkPoly,
    Status as GlpkStatus, Variable as GlpkVar,
};

fn to_i32(value: i64, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| SourcingError::InvalidInput(format!("{} {} does not fit the GLPK integer range", what, value)))
}

/// Convert a model into a GLPK LE polyhedron borrowing the variable names.
///
/// `Ge` rows are negated and `Eq` rows become a pair of opposite `Le` rows.
pub fn to_glpk_polyhedron(problem: &IlpProblem) -> Result<GlpkPoly<'_>> {
    let mut rows: Vec<i32> = Vec::new();
    let mut cols: Vec<i32> = Vec::new();
    let mut vals: Vec<i32> = Vec::new();
    let mut b: Vec<Bound> = Vec::new();

    let mut push_row = |coeffs: &[(usize, i64)], sign: i64, rhs: i64| -> Result<()> {
        let row = b.len() as i32;
        for &(col, coeff) in coeffs {
            rows.push(row);
            cols.push(col as i32);
            vals.push(to_i32(sign * coeff, "coefficient")?);
        }
        b.push((0, to_i32(sign * rhs, "right-hand side")?));
        Ok(())
    };

    for row in &problem.rows {
        if row.coeffs.is_empty() {
            let satisfied = match row.sense {
                RowSense::Le => 0 <= row.rhs,
                RowSense::Ge => 0 >= row.rhs,
                RowSense::Eq => row.rhs == 0,
            };
            if !satisfied {
                return Err(SourcingError::Infeasible {
                    reason: format!("constraint '{}' has no terms and cannot hold", row.name),
                });
            }
            continue;
        }
        match row.sense {
            RowSense::Le => push_row(&row.coeffs, 1, row.rhs)?,
            RowSense::Ge => push_row(&row.coeffs, -1, row.rhs)?,
            RowSense::Eq => {
                push_row(&row.coeffs, 1, row.rhs)?;
                push_row(&row.coeffs, -1, row.rhs)?;
            }
        }
    }

    let variables = problem
        .variables
        .iter()
        .map(|v| {
            Ok(GlpkVar {
                id: v.name.as_str(),
                bound: (to_i32(v.lower, "lower bound")?, to_i32(v.upper, "upper bound")?),
            })
        })
        .collect::<Result<Vec<GlpkVar<'_>>>>()?;

    Ok(GlpkPoly {
        a: GlpkMatrix { rows, cols, vals },
        b,
        variables,
        double_bound: false,
    })
}

/// Objective coefficients keyed by variable name
pub fn to_glpk_objective(problem: &IlpProblem) -> HashMap<&str, f64> {
    problem
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v.cost as f64))
        .collect()
}

impl From<GlpkStatus> for IlpStatus {
    fn from(s: GlpkStatus) -> Self {
        match s {
            GlpkStatus::Optimal => IlpStatus::Optimal,
            GlpkStatus::Infeasible | GlpkStatus::NoFeasible | GlpkStatus::EmptySpace => {
                IlpStatus::Infeasible
            }
            GlpkStatus::Unbounded => IlpStatus::Unbounded,
            GlpkStatus::Undefined => IlpStatus::Undecided("undefined".to_string()),
            GlpkStatus::Feasible => IlpStatus::Undecided("feasible".to_string()),
            GlpkStatus::SimplexFailed => IlpStatus::Undecided("simplex failed".to_string()),
            GlpkStatus::MIPFailed => IlpStatus::Undecided("MIP failed".to_string()),
        }
    }
}

impl From<&PurchasePlan> for PlanDocument {
    fn from(plan: &PurchasePlan) -> Self {
        let diagnostics = plan.diagnostics();
        let sellers = plan
            .orders()
            .iter()
            .map(|order| {
                let items = order
                    .lines
                    .iter()
                    .map(|line| PlanItemDocument {
                        item_id: line.item_id.clone(),
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                        listing_id: line.listing_id.clone(),
                        product_name: line.product_name.clone(),
                    })
                    .collect();
                (
                    order.seller_id.clone(),
                    SellerDocument {
                        items,
                        item_subtotal: order.item_subtotal,
                        shipping_cost: order.shipping_cost,
                    },
                )
            })
            .collect();

        PlanDocument {
            sellers,
            summary: PlanSummary {
                total_item_cost: plan.total_item_cost(),
                total_shipping_cost: plan.total_shipping_cost(),
                grand_total: plan.grand_total(),
                seller_count: plan.seller_count(),
            },
            solver: SolverDocument {
                strategy: diagnostics.strategy.clone(),
                iterations: diagnostics.iterations,
                proven_optimal: diagnostics.proven_optimal,
                elapsed_ms: diagnostics.elapsed.as_millis() as u64,
                cached: false,
            },
        }
    }
}
