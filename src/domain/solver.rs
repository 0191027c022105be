use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Bound propagation gives up after this many sweeps over the rows
const PROPAGATION_PASSES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Integer,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlpVariable {
    pub name: String,
    pub lower: i64,
    pub upper: i64,
    pub kind: VarKind,
    /// Objective coefficient
    pub cost: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowSense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlpRow {
    pub name: String,
    pub coeffs: Vec<(usize, i64)>,
    pub sense: RowSense,
    pub rhs: i64,
}

/// Minimisation integer program: min Σ cost·x subject to rows and variable bounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlpProblem {
    pub variables: Vec<IlpVariable>,
    pub rows: Vec<IlpRow>,
}

impl IlpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: String, lower: i64, upper: i64, kind: VarKind, cost: i64) -> usize {
        self.variables.push(IlpVariable { name, lower, upper, kind, cost });
        self.variables.len() - 1
    }

    pub fn add_row(&mut self, name: String, coeffs: Vec<(usize, i64)>, sense: RowSense, rhs: i64) {
        self.rows.push(IlpRow { name, coeffs, sense, rhs });
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn objective_value(&self, values: &[i64]) -> i64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(var, &value)| var.cost * value)
            .sum()
    }

    /// Name of a row that can never hold, found by propagating variable bounds
    /// through the rows. `None` means no contradiction was found, not that the
    /// problem is feasible.
    pub fn infeasible_row(&self) -> Option<&str> {
        let mut bounds: Vec<(i128, i128)> = self
            .variables
            .iter()
            .map(|var| (var.lower as i128, var.upper as i128))
            .collect();

        for _ in 0..PROPAGATION_PASSES {
            let mut tightened = false;
            for row in &self.rows {
                let sides: &[i128] = match row.sense {
                    RowSense::Le => &[1],
                    RowSense::Ge => &[-1],
                    RowSense::Eq => &[1, -1],
                };
                for &sign in sides {
                    match propagate(&row.coeffs, sign, row.rhs, &mut bounds) {
                        Propagation::Infeasible => return Some(row.name.as_str()),
                        Propagation::Tightened => tightened = true,
                        Propagation::Unchanged => {}
                    }
                }
            }
            if !tightened {
                break;
            }
        }
        None
    }

    /// Write the problem in CPLEX LP text format
    pub fn write_lp<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\\ card sourcing model")?;
        writeln!(out, "Minimize")?;
        let objective: Vec<(usize, i64)> = self
            .variables
            .iter()
            .enumerate()
            .filter(|(_, var)| var.cost != 0)
            .map(|(idx, var)| (idx, var.cost))
            .collect();
        writeln!(out, " obj: {}", self.linear_expr(&objective))?;

        writeln!(out, "Subject To")?;
        for row in &self.rows {
            let op = match row.sense {
                RowSense::Le => "<=",
                RowSense::Ge => ">=",
                RowSense::Eq => "=",
            };
            writeln!(out, " {}: {} {} {}", row.name, self.linear_expr(&row.coeffs), op, row.rhs)?;
        }

        writeln!(out, "Bounds")?;
        for var in self.variables.iter().filter(|v| v.kind == VarKind::Integer) {
            writeln!(out, " {} <= {} <= {}", var.lower, var.name, var.upper)?;
        }

        let generals: Vec<&str> = self.names_of(VarKind::Integer);
        if !generals.is_empty() {
            writeln!(out, "Generals")?;
            writeln!(out, " {}", generals.join(" "))?;
        }
        let binaries: Vec<&str> = self.names_of(VarKind::Binary);
        if !binaries.is_empty() {
            writeln!(out, "Binaries")?;
            writeln!(out, " {}", binaries.join(" "))?;
        }
        writeln!(out, "End")
    }

    fn names_of(&self, kind: VarKind) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| v.kind == kind)
            .map(|v| v.name.as_str())
            .collect()
    }

    fn linear_expr(&self, terms: &[(usize, i64)]) -> String {
        if terms.is_empty() {
            return "0".to_string();
        }
        let mut expr = String::new();
        for (pos, &(col, coeff)) in terms.iter().enumerate() {
            let name = &self.variables[col].name;
            let magnitude = coeff.unsigned_abs();
            let sign = if coeff < 0 { "-" } else { "+" };
            if pos == 0 {
                if coeff < 0 {
                    expr.push('-');
                }
            } else {
                expr.push_str(&format!(" {} ", sign));
            }
            if magnitude == 1 {
                expr.push_str(name);
            } else {
                expr.push_str(&format!("{} {}", magnitude, name));
            }
        }
        expr
    }
}

enum Propagation {
    Unchanged,
    Tightened,
    Infeasible,
}

/// One pass of `sign · Σ a·x ≤ sign · rhs` over integer bounds
fn propagate(coeffs: &[(usize, i64)], sign: i128, rhs: i64, bounds: &mut [(i128, i128)]) -> Propagation {
    let rhs = sign * rhs as i128;
    let min_term = |coeff: i128, (lower, upper): (i128, i128)| {
        if coeff > 0 {
            coeff * lower
        } else {
            coeff * upper
        }
    };

    let min_activity: i128 = coeffs
        .iter()
        .map(|&(col, coeff)| min_term(sign * coeff as i128, bounds[col]))
        .sum();
    if min_activity > rhs {
        return Propagation::Infeasible;
    }

    let mut outcome = Propagation::Unchanged;
    for &(col, coeff) in coeffs {
        let coeff = sign * coeff as i128;
        if coeff == 0 {
            continue;
        }
        let slack = rhs - (min_activity - min_term(coeff, bounds[col]));
        let (lower, upper) = bounds[col];
        if coeff > 0 {
            let cap = slack.div_euclid(coeff);
            if cap < upper {
                bounds[col].1 = cap;
                outcome = Propagation::Tightened;
            }
        } else {
            let floor = -slack.div_euclid(-coeff);
            if floor > lower {
                bounds[col].0 = floor;
                outcome = Propagation::Tightened;
            }
        }
        if bounds[col].0 > bounds[col].1 {
            return Propagation::Infeasible;
        }
    }
    outcome
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IlpStatus {
    Optimal,
    Infeasible,
    TimeLimit,
    Unbounded,
    /// Stopped without a proof either way
    Undecided(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IlpSolution {
    pub status: IlpStatus,
    /// One value per variable, in problem order. Empty unless a solution was found.
    pub values: Vec<i64>,
    pub objective: i64,
}

impl IlpSolution {
    pub fn without_values(status: IlpStatus) -> Self {
        IlpSolution {
            status,
            values: Vec::new(),
            objective: 0,
        }
    }
}

/// Common interface for MIP backends
pub trait MipBackend: Send + Sync {
    /// Solve an integer program to proven optimality
    ///
    /// # Arguments
    /// * `problem` - Minimisation problem with integer/binary variables
    /// * `time_limit` - Wall-clock budget; exhausting it yields `IlpStatus::TimeLimit`
    ///
    /// # Returns
    /// The solver status and, when one was found, the variable values
    fn solve(&self, problem: &IlpProblem, time_limit: Duration) -> Result<IlpSolution>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}
