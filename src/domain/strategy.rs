use std::time::Duration;

use crate::domain::model::Model;
use crate::error::Result;

/// Quantity bought from one listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub listing: usize,
    pub quantity: u64,
}

/// Raw output of one strategy run. Never mutated after the strategy returns it.
#[derive(Debug, Clone)]
pub struct PurchaseResult {
    /// Non-zero allocations
    pub allocations: Vec<Allocation>,
    /// Total cost as evaluated by the strategy's own objective
    pub total_cost: u64,
    pub strategy: String,
    /// Local-search scans for the heuristic, 1 for an exact solve
    pub iterations: u64,
    pub elapsed: Duration,
    pub proven_optimal: bool,
}

/// Common interface for sourcing strategies
pub trait SourcingStrategy: Send + Sync {
    /// Compute a purchase plan for the model
    ///
    /// # Arguments
    /// * `model` - Catalog, demand and policy with their item/seller indices
    ///
    /// # Returns
    /// The non-zero allocations and their total cost, or `Infeasible`/`SolverTimeout`
    fn solve(&self, model: &Model) -> Result<PurchaseResult>;

    /// Get the strategy name for logging/debugging
    fn name(&self) -> &str;
}
