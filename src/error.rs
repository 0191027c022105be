use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type for sourcing operations
pub type Result<T> = std::result::Result<T, SourcingError>;

/// Errors that can occur while building, solving or assembling a purchase plan
#[derive(Error, Debug)]
pub enum SourcingError {
    /// Aggregate stock for an item is below its demand. Detected before any solve.
    #[error("insufficient supply for item '{item_id}': required {required}, available {available}")]
    InsufficientSupply {
        item_id: String,
        required: u64,
        available: u64,
    },

    /// Joint constraints cannot be satisfied even though aggregate supply suffices
    #[error("no feasible purchase plan: {reason}")]
    Infeasible { reason: String },

    /// The exact strategy ran out of time before proving optimality
    #[error("solver {solver} exhausted its {}s time budget without proving optimality", budget.as_secs_f64())]
    SolverTimeout { solver: String, budget: Duration },

    /// A solver produced output that breaks the model. Always a defect.
    #[error("solver output violates the model: {}", join_violations(violations))]
    ModelViolation { violations: Vec<Violation> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("solver backend failure: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourcingError {
    /// Process exit code for the CLI. 2 is left to clap for usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            SourcingError::InsufficientSupply { .. } => 3,
            SourcingError::Infeasible { .. } => 4,
            SourcingError::SolverTimeout { .. } => 5,
            SourcingError::ModelViolation { .. } => 6,
            SourcingError::InvalidInput(_)
            | SourcingError::Backend(_)
            | SourcingError::Io(_)
            | SourcingError::Json(_) => 1,
        }
    }

    /// Stable snake_case name used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            SourcingError::InsufficientSupply { .. } => "insufficient_supply",
            SourcingError::Infeasible { .. } => "infeasible",
            SourcingError::SolverTimeout { .. } => "solver_timeout",
            SourcingError::ModelViolation { .. } => "model_violation",
            SourcingError::InvalidInput(_) => "invalid_input",
            SourcingError::Backend(_) => "backend",
            SourcingError::Io(_) => "io",
            SourcingError::Json(_) => "json",
        }
    }
}

/// One broken invariant found by the plan assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    DemandMismatch {
        item_id: String,
        required: u64,
        allocated: u64,
    },
    StockExceeded {
        item_id: String,
        seller_id: String,
        quantity: u64,
        stock: u64,
    },
    BelowMinimumPurchase {
        seller_id: String,
        subtotal: u64,
        threshold: u64,
    },
    TotalMismatch {
        reported: u64,
        recomputed: u64,
    },
    UnknownListing {
        index: usize,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DemandMismatch {
                item_id,
                required,
                allocated,
            } => write!(
                f,
                "item '{}' allocated {} but {} required",
                item_id, allocated, required
            ),
            Violation::StockExceeded {
                item_id,
                seller_id,
                quantity,
                stock,
            } => write!(
                f,
                "seller '{}' sells {} of item '{}' with only {} in stock",
                seller_id, quantity, item_id, stock
            ),
            Violation::BelowMinimumPurchase {
                seller_id,
                subtotal,
                threshold,
            } => write!(
                f,
                "seller '{}' subtotal {} is below the minimum purchase of {}",
                seller_id, subtotal, threshold
            ),
            Violation::TotalMismatch {
                reported,
                recomputed,
            } => write!(
                f,
                "solver reported total {} but the plan adds up to {}",
                reported, recomputed
            ),
            Violation::UnknownListing { index } => {
                write!(f, "allocation references unknown listing #{}", index)
            }
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_failure_class() {
        let codes = [
            SourcingError::InsufficientSupply {
                item_id: "a".into(),
                required: 3,
                available: 2,
            }
            .exit_code(),
            SourcingError::Infeasible {
                reason: "x".into(),
            }
            .exit_code(),
            SourcingError::SolverTimeout {
                solver: "GLPK".into(),
                budget: Duration::from_secs(1),
            }
            .exit_code(),
            SourcingError::ModelViolation { violations: vec![] }.exit_code(),
        ];
        assert_eq!(codes, [3, 4, 5, 6]);
        assert_eq!(SourcingError::InvalidInput("bad".into()).exit_code(), 1);
    }

    #[test]
    fn test_insufficient_supply_message_names_item() {
        let err = SourcingError::InsufficientSupply {
            item_id: "QCAC-JP010".into(),
            required: 3,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient supply for item 'QCAC-JP010': required 3, available 2"
        );
    }

    #[test]
    fn test_model_violation_lists_every_violation() {
        let err = SourcingError::ModelViolation {
            violations: vec![
                Violation::BelowMinimumPurchase {
                    seller_id: "s1".into(),
                    subtotal: 150,
                    threshold: 200,
                },
                Violation::TotalMismatch {
                    reported: 10,
                    recomputed: 12,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("seller 's1' subtotal 150"));
        assert!(message.contains("reported total 10"));
    }
}
