use std::time::Duration;

use crate::domain::exact::ExactStrategy;
use crate::domain::heuristic::{HeuristicConfig, HeuristicStrategy};
use crate::domain::solver::MipBackend;
use crate::domain::solvers::GlpkSolver;
use crate::domain::strategy::SourcingStrategy;
use crate::models::StrategyName;

#[cfg(feature = "highs-solver")]
use crate::domain::solvers::HighsSolver;

/// Available MIP backends for the exact strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverType {
    Glpk,
    #[cfg(feature = "highs-solver")]
    Highs,
}

impl SolverType {
    /// Parse solver type from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "glpk" => Some(SolverType::Glpk),
            #[cfg(feature = "highs-solver")]
            "highs" => Some(SolverType::Highs),
            _ => None,
        }
    }
}

/// Sourcing strategies behind the common contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Exact,
    Heuristic,
}

impl StrategyKind {
    /// Parse strategy kind from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Some(StrategyKind::Exact),
            "heuristic" => Some(StrategyKind::Heuristic),
            _ => None,
        }
    }
}

impl From<StrategyName> for StrategyKind {
    fn from(name: StrategyName) -> Self {
        match name {
            StrategyName::Exact => StrategyKind::Exact,
            StrategyName::Heuristic => StrategyKind::Heuristic,
        }
    }
}

/// Everything needed to build a strategy for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOptions {
    pub strategy: StrategyKind,
    pub backend: SolverType,
    /// Wall-clock budget of the exact strategy
    pub time_limit: Duration,
    pub heuristic: HeuristicConfig,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            strategy: StrategyKind::Exact,
            backend: SolverType::Glpk,
            time_limit: Duration::from_secs(300),
            heuristic: HeuristicConfig::default(),
        }
    }
}

/// Create a MIP backend instance based on the specified type
pub fn create_backend(solver_type: SolverType) -> Box<dyn MipBackend> {
    match solver_type {
        SolverType::Glpk => Box::new(GlpkSolver::new()),
        #[cfg(feature = "highs-solver")]
        SolverType::Highs => Box::new(HighsSolver::new()),
    }
}

/// Create the strategy selected by `options`
pub fn create_strategy(options: &SolveOptions) -> Box<dyn SourcingStrategy> {
    match options.strategy {
        StrategyKind::Exact => Box::new(ExactStrategy::new(
            create_backend(options.backend),
            options.time_limit,
        )),
        StrategyKind::Heuristic => Box::new(HeuristicStrategy::new(options.heuristic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_type_from_str() {
        assert_eq!(SolverType::from_str("glpk"), Some(SolverType::Glpk));
        assert_eq!(SolverType::from_str("GLPK"), Some(SolverType::Glpk));
        #[cfg(feature = "highs-solver")]
        assert_eq!(SolverType::from_str("highs"), Some(SolverType::Highs));
        #[cfg(feature = "highs-solver")]
        assert_eq!(SolverType::from_str("HiGHS"), Some(SolverType::Highs));
        assert_eq!(SolverType::from_str("unknown"), None);
    }

    #[test]
    fn test_strategy_kind_from_str() {
        assert_eq!(StrategyKind::from_str("exact"), Some(StrategyKind::Exact));
        assert_eq!(StrategyKind::from_str("Heuristic"), Some(StrategyKind::Heuristic));
        assert_eq!(StrategyKind::from_str("greedy"), None);
    }

    #[test]
    fn test_create_glpk_backend() {
        let backend = create_backend(SolverType::Glpk);
        assert_eq!(backend.name(), "GLPK");
    }

    #[cfg(feature = "highs-solver")]
    #[test]
    fn test_create_highs_backend() {
        let backend = create_backend(SolverType::Highs);
        assert_eq!(backend.name(), "HiGHS");
    }

    #[test]
    fn test_create_strategy_by_kind() {
        let exact = create_strategy(&SolveOptions::default());
        assert_eq!(exact.name(), "exact");

        let heuristic = create_strategy(&SolveOptions {
            strategy: StrategyKind::Heuristic,
            ..SolveOptions::default()
        });
        assert_eq!(heuristic.name(), "heuristic");
    }
}
