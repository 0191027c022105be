pub mod catalog;
pub mod demand;
pub mod exact;
pub mod heuristic;
pub mod model;
pub mod plan;
pub mod solver;
pub mod solver_factory;
pub mod solvers;
pub mod strategy;
pub mod validate;
